use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{Value, VmError};

pub type EnvRef = Rc<RefCell<Environment>>;

/// One frame of bindings. The parent link is only ever read through.
#[derive(Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Environment {
    pub fn root(bindings: HashMap<String, Value>) -> EnvRef {
        Rc::new(RefCell::new(Self {
            bindings,
            parent: None,
        }))
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            bindings: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub fn bindings(&self) -> &HashMap<String, Value> {
        &self.bindings
    }

    pub fn parent(&self) -> Option<&EnvRef> {
        self.parent.as_ref()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Adds a binding to this frame; ancestors are not consulted.
    pub fn define(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        if self.bindings.contains_key(name) {
            return Err(VmError::DuplicateBinding(name.to_string()));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }
}

/// Value at the nearest frame defining `name`.
pub fn lookup(env: &EnvRef, name: &str) -> Option<Value> {
    let mut current = Rc::clone(env);
    loop {
        let parent = {
            let frame = current.borrow();
            if let Some(value) = frame.bindings.get(name) {
                return Some(value.clone());
            }
            frame.parent.clone()
        };
        current = parent?;
    }
}

/// Overwrites `name` at the nearest defining frame, handing the value back
/// when no frame defines it.
pub fn assign(env: &EnvRef, name: &str, value: Value) -> Result<(), Value> {
    let mut current = Rc::clone(env);
    loop {
        let parent = {
            let mut frame = current.borrow_mut();
            if let Some(slot) = frame.bindings.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            frame.parent.clone()
        };
        match parent {
            Some(parent) => current = parent,
            None => return Err(value),
        }
    }
}
