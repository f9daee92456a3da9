//! Variable environments for the tree-walking interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// A binding scope. Function calls evaluate against an environment enclosed
/// by the one the function was created in, which is what makes closures work.
#[derive(Debug, Default)]
pub struct Environment {
    store: HashMap<String, Value>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn new_enclosed(outer: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    /// Look a name up here or in any enclosing scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.store.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer| outer.borrow().get(name)),
        }
    }

    /// Bind a name in this scope.
    pub fn put(&mut self, name: &str, value: Value) {
        self.store.insert(name.to_string(), value);
    }

    /// Rebind an existing name, wherever in the chain it lives. Returns
    /// false when the name is unbound.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.store.contains_key(name) {
            self.store.insert(name.to_string(), value);
            return true;
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_walks_outward() {
        let global = Environment::new();
        global.borrow_mut().put("a", Value::Integer(1));

        let inner = Environment::new_enclosed(global.clone());
        inner.borrow_mut().put("b", Value::Integer(2));

        assert_eq!(inner.borrow().get("a"), Some(Value::Integer(1)));
        assert_eq!(inner.borrow().get("b"), Some(Value::Integer(2)));
        assert_eq!(inner.borrow().get("c"), None);
        assert_eq!(global.borrow().get("b"), None);
    }

    #[test]
    fn test_inner_binding_shadows_outer() {
        let global = Environment::new();
        global.borrow_mut().put("x", Value::Integer(1));

        let inner = Environment::new_enclosed(global.clone());
        inner.borrow_mut().put("x", Value::Integer(2));

        assert_eq!(inner.borrow().get("x"), Some(Value::Integer(2)));
        assert_eq!(global.borrow().get("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn test_assign_updates_the_defining_scope() {
        let global = Environment::new();
        global.borrow_mut().put("x", Value::Integer(1));

        let inner = Environment::new_enclosed(global.clone());
        assert!(inner.borrow_mut().assign("x", Value::Integer(5)));
        assert_eq!(global.borrow().get("x"), Some(Value::Integer(5)));

        assert!(!inner.borrow_mut().assign("missing", Value::Null));
    }
}
