mod builtins;

use std::collections::HashMap;

pub use builtins::BUILTINS;

use crate::types::{Type, TypeVar};

/// Signature shapes for the builtin table. `Var(n)` is the n-th type variable of
/// one signature; every use of the same index refers to the same variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdType {
    Number,
    Text,
    Boolean,
    Nil,
    Var(u8),
    List(&'static StdType),
}

#[derive(Clone, Copy, Debug)]
pub struct StdFunction {
    pub name: &'static str,
    pub params: &'static [StdType],
    pub return_type: StdType,
    /// Always returns a Boolean. Lets generated code skip the runtime assertion
    /// when the call is used as a condition.
    pub predicate: bool,
}

pub(crate) const fn std_function(
    name: &'static str,
    params: &'static [StdType],
    return_type: StdType,
) -> StdFunction {
    StdFunction {
        name,
        params,
        return_type,
        predicate: matches!(return_type, StdType::Boolean),
    }
}

impl StdFunction {
    /// The checker's view of this builtin, with fresh variables from `fresh`.
    pub fn signature(&self, fresh: &mut dyn FnMut() -> TypeVar) -> Type {
        let mut variables = HashMap::new();
        let params = self
            .params
            .iter()
            .map(|param| instantiate(*param, &mut variables, fresh))
            .collect();
        let result = instantiate(self.return_type, &mut variables, fresh);
        Type::function(params, result)
    }
}

fn instantiate(
    shape: StdType,
    variables: &mut HashMap<u8, TypeVar>,
    fresh: &mut dyn FnMut() -> TypeVar,
) -> Type {
    match shape {
        StdType::Number => Type::NUMBER,
        StdType::Text => Type::TEXT,
        StdType::Boolean => Type::BOOLEAN,
        StdType::Nil => Type::Nil,
        StdType::Var(index) => Type::Variable(*variables.entry(index).or_insert_with(|| fresh())),
        StdType::List(element) => Type::list(instantiate(*element, variables, fresh)),
    }
}

pub fn find_builtin(name: &str) -> Option<&'static StdFunction> {
    BUILTINS.iter().find(|function| function.name == name)
}
