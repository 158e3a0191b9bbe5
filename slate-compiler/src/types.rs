use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Number,
    Text,
    Boolean,
}

/// A per-call placeholder. Identity is the numeric id; the display name `tN` is
/// derived from it so two variables never share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVar(pub u32);

/// One link of a curried function chain. `terminal` marks the last parameter, so a
/// two-parameter function is distinguishable from one returning a function.
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub input: Box<Type>,
    pub output: Box<Type>,
    pub terminal: bool,
}

#[derive(Debug, Clone)]
pub enum Type {
    Primitive(Primitive),
    List(Box<Type>),
    Record(Vec<(String, Type)>),
    Function(FunctionType),
    Variable(TypeVar),
    Nil,
    Maybe(Box<Type>),
    Custom(String, Vec<Type>),
}

impl Type {
    pub const NUMBER: Type = Type::Primitive(Primitive::Number);
    pub const TEXT: Type = Type::Primitive(Primitive::Text);
    pub const BOOLEAN: Type = Type::Primitive(Primitive::Boolean);

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn maybe(inner: Type) -> Type {
        Type::Maybe(Box::new(inner))
    }

    /// Build the curried chain for a function of `parameters`. A function without
    /// parameters takes `Nil`.
    pub fn function(parameters: Vec<Type>, result: Type) -> Type {
        let mut parameters = parameters;
        if parameters.is_empty() {
            parameters.push(Type::Nil);
        }

        let mut chain = result;
        let mut terminal = true;
        while let Some(input) = parameters.pop() {
            chain = Type::Function(FunctionType {
                input: Box::new(input),
                output: Box::new(chain),
                terminal,
            });
            terminal = false;
        }
        chain
    }

    /// Split a function chain into its parameter types and final result. Returns
    /// `None` for anything that is not a function.
    pub fn signature(&self) -> Option<(Vec<&Type>, &Type)> {
        if !matches!(self, Type::Function(_)) {
            return None;
        }
        let mut parameters = Vec::new();
        let mut current = self;
        while let Type::Function(function) = current {
            parameters.push(function.input.as_ref());
            current = function.output.as_ref();
            if function.terminal {
                break;
            }
        }
        Some((parameters, current))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Type::Variable(_))
    }

    /// Structural compatibility used by the checker. Unlike `==`, an unresolved
    /// variable on either side is compatible with anything.
    pub fn compatible(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Variable(_), _) | (_, Type::Variable(_)) => true,
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Nil, Type::Nil) => true,
            (Type::List(a), Type::List(b)) | (Type::Maybe(a), Type::Maybe(b)) => {
                a.compatible(b)
            }
            (Type::Record(a), Type::Record(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, ty)| {
                        record_field(b, key).is_some_and(|other| ty.compatible(other))
                    })
            }
            (Type::Function(a), Type::Function(b)) => {
                a.terminal == b.terminal
                    && a.input.compatible(&b.input)
                    && a.output.compatible(&b.output)
            }
            (Type::Custom(a, a_params), Type::Custom(b, b_params)) => {
                a == b
                    && a_params.len() == b_params.len()
                    && a_params.iter().zip(b_params).all(|(x, y)| x.compatible(y))
            }
            _ => false,
        }
    }

    /// Whether a binding declared with this type may hold `actual`. An optional
    /// declaration also takes its inner type or `Nil`.
    pub fn accepts(&self, actual: &Type) -> bool {
        if self.compatible(actual) {
            return true;
        }
        match self {
            Type::Maybe(inner) => matches!(actual, Type::Nil) || inner.accepts(actual),
            _ => false,
        }
    }
}

pub fn record_field<'a>(fields: &'a [(String, Type)], key: &str) -> Option<&'a Type> {
    fields
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, ty)| ty)
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Variable(a), Type::Variable(b)) => a == b,
            (Type::Nil, Type::Nil) => true,
            (Type::List(a), Type::List(b)) | (Type::Maybe(a), Type::Maybe(b)) => a == b,
            (Type::Record(a), Type::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, ty)| record_field(b, key).is_some_and(|other| ty == other))
            }
            (Type::Function(a), Type::Function(b)) => {
                a.terminal == b.terminal && a.input == b.input && a.output == b.output
            }
            (Type::Custom(a, a_params), Type::Custom(b, b_params)) => {
                a == b && a_params == b_params
            }
            _ => false,
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Primitive::Number => "Number",
            Primitive::Text => "Text",
            Primitive::Boolean => "Boolean",
        })
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(primitive) => write!(f, "{primitive}"),
            Type::Variable(var) => write!(f, "{var}"),
            Type::Nil => f.write_str("Nil"),
            Type::List(element) => write!(f, "[{element}]"),
            Type::Maybe(inner) => write!(f, "{inner}?"),
            Type::Record(fields) => {
                f.write_str("{")?;
                for (index, (key, ty)) in fields.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {ty}")?;
                }
                f.write_str("}")
            }
            Type::Custom(name, params) => {
                f.write_str(name)?;
                if !params.is_empty() {
                    f.write_str("[")?;
                    for (index, param) in params.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{param}")?;
                    }
                    f.write_str("]")?;
                }
                Ok(())
            }
            Type::Function(_) => {
                let Some((parameters, result)) = self.signature() else {
                    return Ok(());
                };
                f.write_str("(")?;
                let nullary = parameters.len() == 1 && matches!(parameters[0], Type::Nil);
                if !nullary {
                    for (index, parameter) in parameters.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{parameter}")?;
                    }
                }
                write!(f, ") → {result}")
            }
        }
    }
}

/// Bindings from type variables to the types they were pinned to during one call.
#[derive(Debug, Clone, Default)]
pub struct Substitution(HashMap<TypeVar, Type>);

impl Substitution {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, var: TypeVar) -> Option<&Type> {
        self.0.get(&var)
    }

    pub fn insert(&mut self, var: TypeVar, ty: Type) {
        self.0.insert(var, ty);
    }

    /// Replace every bound variable in `ty`, following chains of bindings.
    pub fn apply(&self, ty: &Type) -> Type {
        self.apply_bounded(ty, self.0.len())
    }

    fn apply_bounded(&self, ty: &Type, depth: usize) -> Type {
        match ty {
            Type::Variable(var) => match self.0.get(var) {
                Some(bound) if depth > 0 && bound != ty => self.apply_bounded(bound, depth - 1),
                _ => ty.clone(),
            },
            Type::Primitive(_) | Type::Nil => ty.clone(),
            Type::List(element) => Type::list(self.apply_bounded(element, depth)),
            Type::Maybe(inner) => Type::maybe(self.apply_bounded(inner, depth)),
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(key, ty)| (key.clone(), self.apply_bounded(ty, depth)))
                    .collect(),
            ),
            Type::Function(function) => Type::Function(FunctionType {
                input: Box::new(self.apply_bounded(&function.input, depth)),
                output: Box::new(self.apply_bounded(&function.output, depth)),
                terminal: function.terminal,
            }),
            Type::Custom(name, params) => Type::Custom(
                name.clone(),
                params
                    .iter()
                    .map(|param| self.apply_bounded(param, depth))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_compare_by_key_set() {
        let a = Type::Record(vec![
            ("x".to_string(), Type::NUMBER),
            ("y".to_string(), Type::TEXT),
        ]);
        let b = Type::Record(vec![
            ("y".to_string(), Type::TEXT),
            ("x".to_string(), Type::NUMBER),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn variables_are_compatible_but_not_equal() {
        let var = Type::Variable(TypeVar(0));
        assert!(var.compatible(&Type::NUMBER));
        assert_ne!(var, Type::NUMBER);
    }

    #[test]
    fn nil_matches_only_nil() {
        assert!(Type::Nil.compatible(&Type::Nil));
        assert!(!Type::Nil.compatible(&Type::NUMBER));
    }

    #[test]
    fn apply_follows_bound_chains() {
        let mut subst = Substitution::new();
        subst.insert(TypeVar(0), Type::Variable(TypeVar(1)));
        subst.insert(TypeVar(1), Type::TEXT);
        assert_eq!(subst.apply(&Type::list(Type::Variable(TypeVar(0)))), Type::list(Type::TEXT));
    }

    #[test]
    fn curried_functions_display_as_parameter_lists() {
        let ty = Type::function(vec![Type::NUMBER, Type::TEXT], Type::BOOLEAN);
        assert_eq!(ty.to_string(), "(Number, Text) → Boolean");
        assert_eq!(Type::function(vec![], Type::NUMBER).to_string(), "() → Number");
    }

    #[test]
    fn two_parameters_differ_from_returning_a_function() {
        let curried = Type::function(vec![Type::NUMBER, Type::NUMBER], Type::NUMBER);
        let nested = Type::function(
            vec![Type::NUMBER],
            Type::function(vec![Type::NUMBER], Type::NUMBER),
        );
        assert_ne!(curried, nested);
    }
}
