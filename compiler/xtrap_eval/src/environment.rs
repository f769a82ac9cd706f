//! Variable scoping.
//!
//! A stack of scopes, innermost last. Each binding is a [`Slot`], so taking
//! the address of a variable hands out the binding itself and closures
//! capture variables by reference.

use rustc_hash::FxHashMap;
use xtrap_rt::Slot;

use crate::value::Value;

#[derive(Debug)]
pub struct Environment {
    scopes: Vec<FxHashMap<String, Slot>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            scopes: vec![FxHashMap::default()],
        }
    }

    /// Environment of a closure body: its captures as the outermost scope.
    pub fn with_captures(captured: FxHashMap<String, Slot>) -> Self {
        Environment {
            scopes: vec![captured, FxHashMap::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost scope, shadowing outer bindings.
    /// The blank identifier binds nothing.
    pub fn define(&mut self, name: &str, value: Value) -> Slot {
        let slot = Slot::new(value);
        if name != xtrap_ir::BLANK {
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(name.to_string(), slot.clone());
            }
        }
        slot
    }

    pub fn lookup(&self, name: &str) -> Option<&Slot> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn in_current_scope(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|scope| scope.contains_key(name))
    }

    /// Every visible binding, inner ones winning.
    pub fn capture(&self) -> FxHashMap<String, Slot> {
        let mut captured = FxHashMap::default();
        for scope in &self.scopes {
            for (name, slot) in scope {
                captured.insert(name.clone(), slot.clone());
            }
        }
        captured
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn inner_scope_shadows() {
        let mut env = Environment::new();
        env.define("x", Value::Int(1));
        env.push_scope();
        env.define("x", Value::Int(2));
        assert_eq!(env.lookup("x").and_then(Slot::get::<Value>), Some(Value::Int(2)));
        env.pop_scope();
        assert_eq!(env.lookup("x").and_then(Slot::get::<Value>), Some(Value::Int(1)));
    }

    #[test]
    fn outermost_scope_survives_pop() {
        let mut env = Environment::new();
        env.define("x", Value::Int(1));
        env.pop_scope();
        assert!(env.lookup("x").is_some());
    }

    #[test]
    fn captures_alias_bindings() {
        let mut env = Environment::new();
        let slot = env.define("n", Value::Int(0));
        let closure_env = Environment::with_captures(env.capture());
        let captured = closure_env.lookup("n").cloned();
        assert!(captured.is_some_and(|c| c.ptr_eq(&slot)));
        assert!(!closure_env.in_current_scope("n"));
    }

    #[test]
    fn blank_is_not_bound() {
        let mut env = Environment::new();
        env.define("_", Value::Int(3));
        assert!(env.lookup("_").is_none());
    }
}
