use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub mutable: bool,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Block,
    Function,
}

/// One lexical scope. Scopes form a tree through a shared reference to the
/// enclosing scope; a scope is dropped once the block or function that opened it
/// has been checked.
#[derive(Debug)]
pub struct Environment {
    kind: ScopeKind,
    bindings: RefCell<HashMap<String, Binding>>,
    /// The first `return` seen in a function body fixes this; later ones must agree.
    return_type: RefCell<Option<Type>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    pub fn global() -> Rc<Self> {
        Rc::new(Self {
            kind: ScopeKind::Global,
            bindings: RefCell::new(HashMap::new()),
            return_type: RefCell::new(None),
            enclosing: None,
        })
    }

    pub fn child(enclosing: &Rc<Self>, kind: ScopeKind) -> Rc<Self> {
        Rc::new(Self {
            kind,
            bindings: RefCell::new(HashMap::new()),
            return_type: RefCell::new(None),
            enclosing: Some(Rc::clone(enclosing)),
        })
    }

    /// Add a binding to this scope. Returns `false`, leaving the scope untouched,
    /// when the name is already declared here.
    pub fn declare(&self, name: &str, binding: Binding) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return false;
        }
        bindings.insert(name.to_string(), binding);
        true
    }

    /// Replace the type of a binding in this scope, declaring it if needed.
    pub fn define(&self, name: &str, binding: Binding) {
        self.bindings.borrow_mut().insert(name.to_string(), binding);
    }

    pub fn declares(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Resolve a name from this scope outwards.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.clone());
        }
        self.enclosing
            .as_ref()
            .and_then(|enclosing| enclosing.lookup(name))
    }

    /// The innermost enclosing function body, if any.
    pub fn function_scope(self: &Rc<Self>) -> Option<Rc<Self>> {
        let mut current = Some(Rc::clone(self));
        while let Some(environment) = current {
            if environment.kind == ScopeKind::Function {
                return Some(environment);
            }
            current = environment.enclosing.clone();
        }
        None
    }

    pub fn return_type(&self) -> Option<Type> {
        self.return_type.borrow().clone()
    }

    pub fn set_return_type(&self, ty: Type) {
        *self.return_type.borrow_mut() = Some(ty);
    }
}
