use core::fmt;
use std::rc::Rc;

use crate::{
    context::OutputPort,
    continuation::Continuation,
    environment::Environment,
    error::{SchemeError, SchemeResult},
    value::{Symbol, Value},
};

pub type PrimitiveFn = fn(Vec<Value>, &mut OutputPort) -> SchemeResult<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(expected) => count == expected,
            Self::AtLeast(minimum) => count >= minimum,
        }
    }

    pub fn check(self, name: &str, count: usize) -> SchemeResult<()> {
        if self.accepts(count) { return Ok(()) }
        Err(SchemeError::ArityMismatch {
            name: name.to_owned(),
            expected: self.to_string(),
            got: count,
        })
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(expected) => write!(f, "{}", expected),
            Self::AtLeast(minimum) => write!(f, "at least {}", minimum),
        }
    }
}

/// A native operation that only needs its arguments (and the output port).
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub function: PrimitiveFn,
}

/// Built-in procedures that need to steer the evaluator itself: they either
/// hand control to another procedure or expression, or call back into user
/// code one element at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Apply,
    Eval,
    CallCc,
    Map,
    Filter,
    ForEach,
    Reduce,
}

impl Control {
    pub const BINDINGS: [(&'static str, Control); 8] = [
        ("apply", Control::Apply),
        ("eval", Control::Eval),
        ("call/cc", Control::CallCc),
        ("call-with-current-continuation", Control::CallCc),
        ("map", Control::Map),
        ("filter", Control::Filter),
        ("for-each", Control::ForEach),
        ("reduce", Control::Reduce),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Eval => "eval",
            Self::CallCc => "call/cc",
            Self::Map => "map",
            Self::Filter => "filter",
            Self::ForEach => "for-each",
            Self::Reduce => "reduce",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Self::Apply => Arity::AtLeast(2),
            Self::Eval => Arity::Exactly(2),
            Self::CallCc => Arity::Exactly(1),
            Self::Map | Self::Filter | Self::ForEach => Arity::Exactly(2),
            Self::Reduce => Arity::Exactly(3),
        }
    }
}

/// A user-defined procedure. It closes over its defining environment, not
/// the one it is called from.
pub struct Closure {
    pub name: Option<Symbol>,
    pub parameters: Vec<Symbol>,
    pub rest: Option<Symbol>,
    pub body: Value,
    pub environment: Environment,
}

impl Closure {
    fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.parameters.len()),
            None => Arity::Exactly(self.parameters.len()),
        }
    }

    /// The frame a call runs in: parameters bound to `arguments`, the
    /// surplus collected into the rest parameter.
    pub(crate) fn bind(&self, mut arguments: Vec<Value>) -> SchemeResult<Environment> {
        let name = self.name.as_deref().unwrap_or("lambda");
        self.arity().check(name, arguments.len())?;

        let surplus = arguments.split_off(self.parameters.len());
        let mut bindings: Vec<(Symbol, Value)> = self.parameters.iter().cloned().zip(arguments).collect();
        if let Some(rest) = &self.rest {
            bindings.push((rest.clone(), Value::list(surplus)));
        }

        Ok(self.environment.extend_with(bindings))
    }
}

/// Anything that can sit in operator position of an application.
#[derive(Clone)]
pub enum Procedure {
    Primitive(&'static Primitive),
    Control(Control),
    Closure(Rc<Closure>),
    Continuation(Continuation),
}

impl Procedure {
    pub fn name(&self) -> &str {
        match self {
            Self::Primitive(primitive) => primitive.name,
            Self::Control(control) => control.name(),
            Self::Closure(closure) => closure.name.as_deref().unwrap_or("lambda"),
            Self::Continuation(_) => "continuation",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Primitive(primitive) => primitive.arity,
            Self::Control(control) => control.arity(),
            Self::Closure(closure) => closure.arity(),
            Self::Continuation(_) => Arity::Exactly(1),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => core::ptr::eq(*a, *b),
            (Self::Control(a), Self::Control(b)) => a == b,
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            (Self::Continuation(a), Self::Continuation(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(_) | Self::Control(_) => write!(f, "#[primitive {}]", self.name()),
            Self::Closure(closure) => match &closure.name {
                Some(name) => write!(f, "#[closure {}]", name),
                None => write!(f, "#[closure]"),
            },
            Self::Continuation(_) => write!(f, "#[continuation]"),
        }
    }
}
