use core::fmt;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{error::{SchemeError, SchemeResult}, value::{Symbol, Value}};


/// One scope level. Frames are shared by every closure and continuation
/// created inside them, so a binding changed through one holder is seen by
/// all of them.
struct Frame {
    bindings: RefCell<HashMap<Symbol, Value>>,
    parent: Option<Environment>,
}

/// A chain of frames, innermost first.
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    pub fn root() -> Self {
        Self::root_with(HashMap::new())
    }

    pub fn root_with(bindings: HashMap<Symbol, Value>) -> Self {
        Self(Rc::new(Frame {
            bindings: RefCell::new(bindings),
            parent: None,
        }))
    }

    /// A new, empty child frame.
    pub fn extend(&self) -> Self {
        self.extend_with(core::iter::empty())
    }

    pub fn extend_with(&self, bindings: impl IntoIterator<Item = (Symbol, Value)>) -> Self {
        Self(Rc::new(Frame {
            bindings: RefCell::new(bindings.into_iter().collect()),
            parent: Some(self.clone()),
        }))
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> + '_ {
        core::iter::successors(Some(&*self.0), |frame| frame.parent.as_ref().map(|parent| &*parent.0))
    }

    pub fn lookup(&self, name: &str) -> SchemeResult<Value> {
        self.frames()
            .find_map(|frame| frame.bindings.borrow().get(name).cloned())
            .ok_or_else(|| SchemeError::Unbound(name.to_owned()))
    }

    /// Binds `name` in this frame, replacing any binding it already has here.
    pub fn define(&self, name: Symbol, value: Value) {
        self.0.bindings.borrow_mut().insert(name, value);
    }

    /// Rebinds `name` in the nearest frame that binds it.
    pub fn set(&self, name: &str, value: Value) -> SchemeResult<()> {
        let frame = self.frames()
            .find(|frame| frame.bindings.borrow().contains_key(name))
            .ok_or_else(|| SchemeError::Unbound(name.to_owned()))?;

        if let Some(slot) = frame.bindings.borrow_mut().get_mut(name) {
            *slot = value;
        }
        Ok(())
    }

    pub fn binds_locally(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#[environment]")
    }
}
