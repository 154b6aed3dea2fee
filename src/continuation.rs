use std::rc::Rc;

use crate::{
    environment::Environment,
    interpreter::ControlStep,
    procedure::Procedure,
    special_form::FormStep,
    value::Value,
};


/// One unit of work waiting for the value of a subexpression.
#[derive(Clone)]
pub(crate) enum Pending {
    /// The operator is being evaluated; `operands` are still unevaluated.
    Operator { operands: Value, environment: Environment },

    /// An operand is being evaluated for a call to `procedure`.
    Operands {
        procedure: Procedure,
        evaluated: Vec<Value>,
        remaining: Value,
        environment: Environment,
    },

    Form(FormStep),
    Control(ControlStep),
}

struct Link {
    pending: Pending,
    next: Continuation,
}

/// The rest of the computation, as an immutable stack of pending work.
///
/// Links are shared, never mutated: capturing a continuation is a clone of
/// the head pointer, and resuming it (any number of times) just makes that
/// head the machine's current stack again.
#[derive(Clone, Default)]
pub struct Continuation(Option<Rc<Link>>);

impl Continuation {
    pub(crate) fn halt() -> Self {
        Self(None)
    }

    pub(crate) fn push(&mut self, pending: Pending) {
        let next = core::mem::take(self);
        *self = Self(Some(Rc::new(Link { pending, next })));
    }

    /// Takes the innermost pending work. Links still shared with a captured
    /// continuation are copied rather than moved out.
    pub(crate) fn pop(&mut self) -> Option<Pending> {
        let link = self.0.take()?;
        match Rc::try_unwrap(link) {
            Ok(mut link) => {
                *self = core::mem::take(&mut link.next);
                Some(link.pending)
            }
            Err(shared) => {
                *self = shared.next.clone();
                Some(shared.pending.clone())
            }
        }
    }

    pub fn depth(&self) -> usize {
        core::iter::successors(self.0.as_deref(), |link| link.next.0.as_deref()).count()
    }

    pub fn is_halt(&self) -> bool {
        self.0.is_none()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

// Deep non-tail recursion leaves long chains behind; release them iteratively
impl Drop for Continuation {
    fn drop(&mut self) {
        let mut next = self.0.take();
        while let Some(link) = next {
            next = match Rc::try_unwrap(link) {
                Ok(mut link) => link.next.0.take(),
                Err(_) => None,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(value: i64) -> Pending {
        Pending::Operator { operands: Value::integer(value), environment: Environment::root() }
    }

    fn operand_of(pending: Option<Pending>) -> Option<String> {
        match pending {
            Some(Pending::Operator { operands, .. }) => Some(operands.to_string()),
            _ => None,
        }
    }

    #[test]
    fn push_and_pop_in_stack_order() {
        let mut continuation = Continuation::halt();
        continuation.push(pending(1));
        continuation.push(pending(2));
        assert_eq!(continuation.depth(), 2);

        assert_eq!(operand_of(continuation.pop()).as_deref(), Some("2"));
        assert_eq!(operand_of(continuation.pop()).as_deref(), Some("1"));
        assert!(continuation.pop().is_none());
        assert!(continuation.is_halt());
    }

    #[test]
    fn captured_copies_survive_popping() {
        let mut continuation = Continuation::halt();
        continuation.push(pending(1));
        continuation.push(pending(2));

        let captured = continuation.clone();
        while continuation.pop().is_some() {}

        for _ in 0..3 {
            let mut resumed = captured.clone();
            assert_eq!(operand_of(resumed.pop()).as_deref(), Some("2"));
            assert_eq!(operand_of(resumed.pop()).as_deref(), Some("1"));
        }
        assert_eq!(captured.depth(), 2);
    }

    #[test]
    fn deep_chains_drop_iteratively() {
        let mut continuation = Continuation::halt();
        for index in 0..200_000 {
            continuation.push(pending(index));
        }
        assert_eq!(continuation.depth(), 200_000);
        drop(continuation);
    }
}
