use core::fmt;
use std::rc::Rc;

use crate::{environment::Environment, number::Number, procedure::Procedure, special_form::SpecialForm};

pub type Symbol = Rc<str>;

/// A cons cell. Cells are shared by reference, so two lists may alias the
/// same tail.
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

impl Pair {
    fn detach_children(&mut self, pending: &mut Vec<Value>) {
        for slot in [&mut self.car, &mut self.cdr] {
            if matches!(slot, Value::Pair(_)) {
                pending.push(core::mem::replace(slot, Value::Nil));
            }
        }
    }
}

// Lists nest through both car and cdr; unlink uniquely owned cells from a
// worklist instead of recursing through either
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(value) = pending.pop() {
            if let Value::Pair(pair) = value {
                if let Ok(mut pair) = Rc::try_unwrap(pair) {
                    pair.detach_children(&mut pending);
                }
            }
        }
    }
}

/// Every runtime value, and every expression: programs are read into the
/// same representation they manipulate.
#[derive(Clone)]
pub enum Value {
    Nil,
    Unspecified,
    Boolean(bool),
    Number(Number),
    Symbol(Symbol),
    String(Rc<str>),
    Pair(Rc<Pair>),
    Procedure(Procedure),
    SpecialForm(SpecialForm),
    Environment(Environment),
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Self {
        Self::Pair(Rc::new(Pair { car, cdr }))
    }

    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Self {
        Self::String(Rc::from(text))
    }

    pub fn integer(value: i64) -> Self {
        Self::Number(Number::Integer(value))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::list_with_tail(values, Self::Nil)
    }

    pub fn list_with_tail(values: Vec<Value>, tail: Value) -> Self {
        values.into_iter().rev().fold(tail, |cdr, car| Self::cons(car, cdr))
    }

    /// Only `#f` is false.
    pub fn is_true(&self) -> bool {
        !matches!(self, Self::Boolean(false))
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, Self::Symbol(symbol) if &**symbol == name)
    }

    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    pub fn is_list(&self) -> bool {
        self.list_length().is_some()
    }

    pub fn list_length(&self) -> Option<usize> {
        let mut iter = self.iter();
        let length = iter.by_ref().count();
        matches!(iter.terminator(), Self::Nil).then_some(length)
    }

    /// The elements of a proper list, `None` for anything else.
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut iter = self.iter();
        let values: Vec<Value> = iter.by_ref().cloned().collect();
        matches!(iter.terminator(), Self::Nil).then_some(values)
    }

    /// Identity for pairs, strings, procedures and environments; value
    /// equality for everything else.
    pub fn eqv(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) | (Self::Unspecified, Self::Unspecified) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b),
            (Self::Pair(a), Self::Pair(b)) => Rc::ptr_eq(a, b),
            (Self::Procedure(a), Self::Procedure(b)) => a.ptr_eq(b),
            (Self::SpecialForm(a), Self::SpecialForm(b)) => a == b,
            (Self::Environment(a), Self::Environment(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural equality on pairs and strings.
    pub fn equal(&self, other: &Value) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            match (a, b) {
                (Self::Pair(x), Self::Pair(y)) => {
                    if Rc::ptr_eq(x, y) { continue; }
                    pending.push((&x.cdr, &y.cdr));
                    pending.push((&x.car, &y.car));
                }
                (Self::String(x), Self::String(y)) => if x != y { return false },
                _ => if !a.eqv(b) { return false },
            }
        }
        true
    }

    /// Renders the value the way `display` writes it: strings without quotes.
    pub fn display(&self) -> Displayed<'_> {
        Displayed(self)
    }
}

pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> ListIter<'a> {
    /// Whatever terminated the chain: `Nil` for a proper list.
    pub fn terminator(&self) -> &'a Value {
        self.current
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(pair) => {
                self.current = &pair.cdr;
                Some(&pair.car)
            }
            _ => None,
        }
    }
}

enum Print<'a> {
    Value(&'a Value),
    /// The rest of a list whose opening parenthesis is already written.
    Rest(&'a Value),
    Text(&'static str),
}

fn write_atom(f: &mut fmt::Formatter<'_>, value: &Value, quoted: bool) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::Unspecified => write!(f, "okay"),
        Value::Boolean(true) => write!(f, "#t"),
        Value::Boolean(false) => write!(f, "#f"),
        Value::Number(number) => write!(f, "{}", number),
        Value::Symbol(symbol) => write!(f, "{}", symbol),
        Value::String(text) if quoted => {
            write!(f, "\"")?;
            for c in text.chars() {
                if matches!(c, '"' | '\\') { write!(f, "\\")?; }
                write!(f, "{}", c)?;
            }
            write!(f, "\"")
        }
        Value::String(text) => write!(f, "{}", text),
        Value::Procedure(procedure) => write!(f, "{}", procedure),
        Value::SpecialForm(form) => write!(f, "#[special-form {}]", form.name()),
        Value::Environment(_) => write!(f, "#[environment]"),
        Value::Pair(_) => Ok(()),
    }
}

// Printed from an explicit stack so nesting depth is bounded only by memory
fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, quoted: bool) -> fmt::Result {
    let mut pending = vec![Print::Value(value)];
    while let Some(item) = pending.pop() {
        match item {
            Print::Text(text) => f.write_str(text)?,
            Print::Value(Value::Pair(pair)) => {
                f.write_str("(")?;
                pending.push(Print::Rest(&pair.cdr));
                pending.push(Print::Value(&pair.car));
            }
            Print::Value(atom) => write_atom(f, atom, quoted)?,
            Print::Rest(Value::Nil) => f.write_str(")")?,
            Print::Rest(Value::Pair(pair)) => {
                f.write_str(" ")?;
                pending.push(Print::Rest(&pair.cdr));
                pending.push(Print::Value(&pair.car));
            }
            Print::Rest(tail) => {
                f.write_str(" . ")?;
                pending.push(Print::Text(")"));
                pending.push(Print::Value(tail));
            }
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, true)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

pub struct Displayed<'a>(&'a Value);

impl fmt::Display for Displayed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.0, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::integer).collect())
    }

    #[test]
    fn prints_lists_and_pairs() {
        assert_eq!(numbers(&[1, 2, 3]).to_string(), "(1 2 3)");
        assert_eq!(Value::cons(Value::integer(1), Value::integer(2)).to_string(), "(1 . 2)");
        assert_eq!(Value::list_with_tail(vec![Value::integer(1), Value::integer(2)], Value::integer(3)).to_string(), "(1 2 . 3)");
        assert_eq!(Value::list(vec![numbers(&[]), Value::Boolean(true)]).to_string(), "(() #t)");
    }

    #[test]
    fn strings_are_quoted_unless_displayed() {
        let value = Value::string("hi there");
        assert_eq!(value.to_string(), "\"hi there\"");
        assert_eq!(value.display().to_string(), "hi there");
    }

    #[test]
    fn shared_tails_alias() {
        let tail = numbers(&[2, 3]);
        let a = Value::cons(Value::integer(1), tail.clone());
        let b = Value::cons(Value::integer(9), tail.clone());

        let (Value::Pair(a), Value::Pair(b)) = (a, b) else { panic!("expected pairs") };
        assert!(a.cdr.eqv(&b.cdr));
        assert!(!a.car.equal(&b.car));
    }

    #[test]
    fn equality() {
        assert!(numbers(&[1, 2]).equal(&numbers(&[1, 2])));
        assert!(!numbers(&[1, 2]).eqv(&numbers(&[1, 2])));
        assert!(Value::symbol("a").eqv(&Value::symbol("a")));
        assert!(Value::string("a").equal(&Value::string("a")));
        assert!(!Value::string("a").eqv(&Value::string("a")));
    }

    #[test]
    fn list_shape() {
        assert_eq!(numbers(&[1, 2, 3]).list_length(), Some(3));
        assert_eq!(Value::cons(Value::integer(1), Value::integer(2)).list_length(), None);
        assert!(Value::Nil.is_list());
        assert!(!Value::integer(1).is_list());
    }

    #[test]
    fn long_lists_drop_without_recursion() {
        let long = Value::list((0..200_000).map(Value::integer).collect());
        assert_eq!(long.list_length(), Some(200_000));
        drop(long);
    }

    #[test]
    fn deep_car_nesting_prints_compares_and_drops() {
        let nest = |depth: usize| (0..depth).fold(Value::Nil, |inner, _| Value::list(vec![inner]));
        let deep = nest(100_000);

        assert_eq!(deep.to_string().len(), 200_002);
        assert!(deep.equal(&nest(100_000)));
        assert!(!deep.equal(&nest(99_999)));
        drop(deep);
    }

    #[test]
    fn only_false_is_false() {
        assert!(!Value::Boolean(false).is_true());
        for value in [Value::Nil, Value::integer(0), Value::symbol("nil"), Value::Boolean(true)] {
            assert!(value.is_true());
        }
    }
}
