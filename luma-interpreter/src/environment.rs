use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use luma_core::ast::Identifier;

use crate::value::{RuntimeError, Value};

struct EnvironmentCore {
    store: HashMap<Rc<str>, Value>,
    outer: Option<Environment>,
}

/// One frame of the scope chain. Cloning shares the frame, so a closure and
/// the block that created it observe each other's writes.
#[derive(Clone)]
pub struct Environment {
    environment: Rc<RefCell<EnvironmentCore>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            environment: Rc::new(RefCell::new(EnvironmentCore {
                store: HashMap::new(),
                outer: None,
            })),
        }
    }

    pub fn new_enclosed(outer: &Environment) -> Environment {
        Environment {
            environment: Rc::new(RefCell::new(EnvironmentCore {
                store: HashMap::new(),
                outer: Some(outer.clone()),
            })),
        }
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: Rc<str>, value: Value) {
        self.environment.borrow_mut().store.insert(name, value);
    }

    /// Find the nearest frame that binds `name`.
    fn resolve(&self, name: &str) -> Option<Environment> {
        let mut current = self.clone();
        loop {
            if current.environment.borrow().store.contains_key(name) {
                return Some(current);
            }
            let outer = current.environment.borrow().outer.clone();
            current = outer?;
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let frame = self.resolve(name)?;
        let value = frame.environment.borrow().store.get(name).cloned();
        value
    }

    pub fn get(&self, identifier: &Identifier) -> Result<Value, RuntimeError> {
        self.lookup(&identifier.name)
            .ok_or_else(|| undefined_variable(identifier))
    }

    pub fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Overwrite the nearest existing binding. Never creates one.
    pub fn assign(&self, identifier: &Identifier, value: Value) -> Result<(), RuntimeError> {
        let frame = self
            .resolve(&identifier.name)
            .ok_or_else(|| undefined_variable(identifier))?;
        frame
            .environment
            .borrow_mut()
            .store
            .insert(identifier.name.clone(), value);
        Ok(())
    }

    /// `name = value`: update an enclosing binding if one exists, otherwise
    /// define the name in this frame.
    pub fn assign_or_define(&self, identifier: &Identifier, value: Value) {
        match self.resolve(&identifier.name) {
            Some(frame) => {
                frame
                    .environment
                    .borrow_mut()
                    .store
                    .insert(identifier.name.clone(), value);
            }
            None => self.define(identifier.name.clone(), value),
        }
    }

    /// Names bound directly in this frame.
    pub fn names(&self) -> Vec<Rc<str>> {
        self.environment.borrow().store.keys().cloned().collect()
    }
}

fn undefined_variable(identifier: &Identifier) -> RuntimeError {
    RuntimeError::UndefinedVariable {
        name: identifier.name.clone(),
        line: identifier.line,
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("enclosed", &self.environment.borrow().outer.is_some())
            .finish()
    }
}
