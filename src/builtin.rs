use std::{cmp::Ordering, collections::HashMap};

use itertools::Itertools;

use crate::{
    context::OutputPort,
    environment::Environment,
    error::{SchemeError, SchemeResult},
    number::Number,
    procedure::{Arity, Control, Primitive, Procedure},
    special_form::SpecialForm,
    value::{Symbol, Value},
};


fn values_to_numbers(name: &str, values: Vec<Value>) -> SchemeResult<Vec<Number>> {
    values.into_iter()
        .map(|value| match value {
            Value::Number(number) => Ok(number),
            other => Err(SchemeError::wrong_type(name, "number", other)),
        }).collect()
}

fn single(values: Vec<Value>) -> Value {
    values.into_iter().next().unwrap_or(Value::Unspecified)
}

fn pair_of(values: Vec<Value>) -> (Value, Value) {
    let mut values = values.into_iter();
    (values.next().unwrap_or(Value::Unspecified), values.next().unwrap_or(Value::Unspecified))
}

fn single_number(name: &str, values: Vec<Value>) -> SchemeResult<Number> {
    match single(values) {
        Value::Number(number) => Ok(number),
        other => Err(SchemeError::wrong_type(name, "number", other)),
    }
}

fn single_integer(name: &str, values: Vec<Value>) -> SchemeResult<Number> {
    let number = single_number(name, values)?;
    if !number.is_integer() { return Err(SchemeError::wrong_type(name, "integer", number)) }
    Ok(number)
}

fn builtin_add(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    values_to_numbers("+", values)?.into_iter()
        .try_fold(Number::Integer(0), Number::add)
        .map(Value::Number)
}

fn builtin_sub(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let numbers = values_to_numbers("-", values)?;
    let Some((first, rest)) = numbers.split_first() else { return Ok(Value::integer(0)) };
    if rest.is_empty() { return first.negate().map(Value::Number) }

    rest.iter().try_fold(*first, |a, b| a.sub(*b)).map(Value::Number)
}

fn builtin_mul(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    values_to_numbers("*", values)?.into_iter()
        .try_fold(Number::Integer(1), Number::mul)
        .map(Value::Number)
}

fn builtin_div(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let numbers = values_to_numbers("/", values)?;
    let Some((first, rest)) = numbers.split_first() else { return Ok(Value::integer(1)) };
    if rest.is_empty() { return Number::Integer(1).div(*first).map(Value::Number) }

    rest.iter().try_fold(*first, |a, b| a.div(*b)).map(Value::Number)
}

fn builtin_integer_division(
    name: &str,
    values: Vec<Value>,
    operation: fn(Number, Number) -> SchemeResult<Number>,
) -> SchemeResult<Value> {
    let numbers = values_to_numbers(name, values)?;
    if let Some(number) = numbers.iter().find(|number| !number.is_integer()) {
        return Err(SchemeError::wrong_type(name, "integer", number));
    }
    let (Some(&a), Some(&b)) = (numbers.first(), numbers.get(1)) else {
        return Err(SchemeError::ArityMismatch { name: name.to_owned(), expected: "2".to_owned(), got: numbers.len() });
    };
    operation(a, b).map(|number| Value::Number(number.integral()))
}

fn builtin_quotient(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_integer_division("quotient", values, Number::quotient)
}

fn builtin_modulo(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_integer_division("modulo", values, Number::modulo)
}

fn builtin_remainder(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_integer_division("remainder", values, Number::remainder)
}

fn builtin_floor(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Number(single_number("floor", values)?.floor()))
}

fn builtin_ceiling(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Number(single_number("ceiling", values)?.ceiling()))
}

fn builtin_compare(name: &str, values: Vec<Value>, accept: fn(Ordering) -> bool) -> SchemeResult<Value> {
    let numbers = values_to_numbers(name, values)?;
    Ok(Value::Boolean(numbers.into_iter()
        .tuple_windows()
        .all(|(a, b)| a.compare(b).is_some_and(accept))))
}

fn builtin_eq(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_compare("=", values, Ordering::is_eq)
}

fn builtin_less(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_compare("<", values, Ordering::is_lt)
}

fn builtin_less_eq(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_compare("<=", values, Ordering::is_le)
}

fn builtin_greater(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_compare(">", values, Ordering::is_gt)
}

fn builtin_greater_eq(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    builtin_compare(">=", values, Ordering::is_ge)
}

fn builtin_even(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let number = single_integer("even?", values)?;
    Ok(Value::Boolean(number.remainder(Number::Integer(2))?.is_zero()))
}

fn builtin_odd(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let number = single_integer("odd?", values)?;
    Ok(Value::Boolean(!number.remainder(Number::Integer(2))?.is_zero()))
}

fn builtin_zero(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(single_number("zero?", values)?.is_zero()))
}

fn builtin_positive(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(single_number("positive?", values)?.signum().is_gt()))
}

fn builtin_negative(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(single_number("negative?", values)?.signum().is_lt()))
}

fn builtin_is_boolean(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Boolean(_))))
}

fn builtin_not(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(!single(values).is_true()))
}

fn builtin_is_eqv(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let (a, b) = pair_of(values);
    Ok(Value::Boolean(a.eqv(&b)))
}

fn builtin_is_equal(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let (a, b) = pair_of(values);
    Ok(Value::Boolean(a.equal(&b)))
}

fn builtin_is_pair(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Pair(_))))
}

fn builtin_is_null(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Nil)))
}

fn builtin_is_list(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(single(values).is_list()))
}

fn builtin_is_string(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::String(_))))
}

fn builtin_is_symbol(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Symbol(_))))
}

fn builtin_is_number(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Number(_))))
}

fn builtin_is_integer(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Number(number) if number.is_integer())))
}

fn builtin_is_procedure(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::Boolean(matches!(single(values), Value::Procedure(_))))
}

fn builtin_cons(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let (car, cdr) = pair_of(values);
    Ok(Value::cons(car, cdr))
}

fn builtin_car(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    match single(values) {
        Value::Pair(pair) => Ok(pair.car.clone()),
        other => Err(SchemeError::wrong_type("car", "pair", other)),
    }
}

fn builtin_cdr(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    match single(values) {
        Value::Pair(pair) => Ok(pair.cdr.clone()),
        other => Err(SchemeError::wrong_type("cdr", "pair", other)),
    }
}

fn builtin_list(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    Ok(Value::list(values))
}

fn builtin_length(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    let list = single(values);
    let length = list.list_length().ok_or_else(|| SchemeError::wrong_type("length", "list", &list))?;
    i64::try_from(length).map(Value::integer).map_err(|_| SchemeError::IntegerOverflow)
}

fn builtin_append(mut values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    // Every argument but the last is copied; the last becomes the shared tail

    let Some(tail) = values.pop() else { return Ok(Value::Nil) };
    values.into_iter().rev().try_fold(tail, |tail, list| {
        let items = list.list_to_vec().ok_or_else(|| SchemeError::wrong_type("append", "list", &list))?;
        Ok(Value::list_with_tail(items, tail))
    })
}

fn builtin_display(values: Vec<Value>, port: &mut OutputPort) -> SchemeResult<Value> {
    port.write_str(&single(values).display().to_string())?;
    Ok(Value::Unspecified)
}

fn builtin_newline(_values: Vec<Value>, port: &mut OutputPort) -> SchemeResult<Value> {
    port.write_str("\n")?;
    Ok(Value::Unspecified)
}

fn report_version(name: &str, values: Vec<Value>) -> SchemeResult<()> {
    match single(values) {
        Value::Number(Number::Integer(5)) => Ok(()),
        other => Err(SchemeError::InvalidArgument(format!("{}: unsupported version {}", name, other))),
    }
}

fn builtin_scheme_report_environment(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    report_version("scheme-report-environment", values)?;
    Ok(Value::Environment(report_environment()))
}

fn builtin_null_environment(values: Vec<Value>, _port: &mut OutputPort) -> SchemeResult<Value> {
    report_version("null-environment", values)?;
    Ok(Value::Environment(null_environment()))
}

static PRIMITIVES: &[Primitive] = &[
    Primitive { name: "+", arity: Arity::AtLeast(0), function: builtin_add },
    Primitive { name: "-", arity: Arity::AtLeast(1), function: builtin_sub },
    Primitive { name: "*", arity: Arity::AtLeast(0), function: builtin_mul },
    Primitive { name: "/", arity: Arity::AtLeast(1), function: builtin_div },
    Primitive { name: "quotient", arity: Arity::Exactly(2), function: builtin_quotient },
    Primitive { name: "modulo", arity: Arity::Exactly(2), function: builtin_modulo },
    Primitive { name: "remainder", arity: Arity::Exactly(2), function: builtin_remainder },
    Primitive { name: "floor", arity: Arity::Exactly(1), function: builtin_floor },
    Primitive { name: "ceiling", arity: Arity::Exactly(1), function: builtin_ceiling },
    Primitive { name: "=", arity: Arity::AtLeast(2), function: builtin_eq },
    Primitive { name: "<", arity: Arity::AtLeast(2), function: builtin_less },
    Primitive { name: "<=", arity: Arity::AtLeast(2), function: builtin_less_eq },
    Primitive { name: ">", arity: Arity::AtLeast(2), function: builtin_greater },
    Primitive { name: ">=", arity: Arity::AtLeast(2), function: builtin_greater_eq },
    Primitive { name: "even?", arity: Arity::Exactly(1), function: builtin_even },
    Primitive { name: "odd?", arity: Arity::Exactly(1), function: builtin_odd },
    Primitive { name: "zero?", arity: Arity::Exactly(1), function: builtin_zero },
    Primitive { name: "positive?", arity: Arity::Exactly(1), function: builtin_positive },
    Primitive { name: "negative?", arity: Arity::Exactly(1), function: builtin_negative },
    Primitive { name: "boolean?", arity: Arity::Exactly(1), function: builtin_is_boolean },
    Primitive { name: "not", arity: Arity::Exactly(1), function: builtin_not },
    Primitive { name: "eq?", arity: Arity::Exactly(2), function: builtin_is_eqv },
    Primitive { name: "eqv?", arity: Arity::Exactly(2), function: builtin_is_eqv },
    Primitive { name: "equal?", arity: Arity::Exactly(2), function: builtin_is_equal },
    Primitive { name: "pair?", arity: Arity::Exactly(1), function: builtin_is_pair },
    Primitive { name: "null?", arity: Arity::Exactly(1), function: builtin_is_null },
    Primitive { name: "list?", arity: Arity::Exactly(1), function: builtin_is_list },
    Primitive { name: "string?", arity: Arity::Exactly(1), function: builtin_is_string },
    Primitive { name: "symbol?", arity: Arity::Exactly(1), function: builtin_is_symbol },
    Primitive { name: "number?", arity: Arity::Exactly(1), function: builtin_is_number },
    Primitive { name: "integer?", arity: Arity::Exactly(1), function: builtin_is_integer },
    Primitive { name: "procedure?", arity: Arity::Exactly(1), function: builtin_is_procedure },
    Primitive { name: "cons", arity: Arity::Exactly(2), function: builtin_cons },
    Primitive { name: "car", arity: Arity::Exactly(1), function: builtin_car },
    Primitive { name: "cdr", arity: Arity::Exactly(1), function: builtin_cdr },
    Primitive { name: "list", arity: Arity::AtLeast(0), function: builtin_list },
    Primitive { name: "length", arity: Arity::Exactly(1), function: builtin_length },
    Primitive { name: "append", arity: Arity::AtLeast(0), function: builtin_append },
    Primitive { name: "display", arity: Arity::Exactly(1), function: builtin_display },
    Primitive { name: "newline", arity: Arity::Exactly(0), function: builtin_newline },
    Primitive { name: "scheme-report-environment", arity: Arity::Exactly(1), function: builtin_scheme_report_environment },
    Primitive { name: "null-environment", arity: Arity::Exactly(1), function: builtin_null_environment },
];

/// Looks up a primitive by the name it is bound to in a fresh global frame.
pub(crate) fn primitive(name: &str) -> SchemeResult<Procedure> {
    PRIMITIVES.iter()
        .find(|primitive| primitive.name == name)
        .map(Procedure::Primitive)
        .ok_or_else(|| SchemeError::Unbound(name.to_owned()))
}

fn special_form_bindings() -> impl Iterator<Item = (Symbol, Value)> {
    SpecialForm::ALL.into_iter().map(|form| (Symbol::from(form.name()), Value::SpecialForm(form)))
}

/// Every binding a new session starts with.
pub fn builtin_frame() -> HashMap<Symbol, Value> {
    let primitives = PRIMITIVES.iter()
        .map(|primitive| (Symbol::from(primitive.name), Value::Procedure(Procedure::Primitive(primitive))));
    let controls = Control::BINDINGS.into_iter()
        .map(|(name, control)| (Symbol::from(name), Value::Procedure(Procedure::Control(control))));

    special_form_bindings()
        .chain(primitives)
        .chain(controls)
        .chain([(Symbol::from("nil"), Value::Nil)])
        .collect()
}

/// A standalone environment holding only the builtin bindings.
pub fn report_environment() -> Environment {
    Environment::root_with(builtin_frame())
}

/// A standalone environment holding only the special forms.
pub fn null_environment() -> Environment {
    Environment::root_with(special_form_bindings().collect())
}

#[cfg(test)]
mod tests {
    use crate::context::{EvaluationContext, OutputPort};

    use super::*;

    fn run(source: &str) -> String {
        let mut context = EvaluationContext::with_output(OutputPort::captured());
        match context.evaluate_str(source) {
            Ok(value) => value.to_string(),
            Err(error) => format!("<{}>", error.kind()),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run("(+)"), "0");
        assert_eq!(run("(+ 1 2 3)"), "6");
        assert_eq!(run("(- 5)"), "-5");
        assert_eq!(run("(- 10 1 2)"), "7");
        assert_eq!(run("(* 2 3 4)"), "24");
        assert_eq!(run("(/ 6 3)"), "2");
        assert_eq!(run("(/ 1 2)"), "0.5");
        assert_eq!(run("(/ 4)"), "0.25");
        assert_eq!(run("(+ 1.5 1.5)"), "3");
        assert_eq!(run("(+ 1/2 1/3)"), "5/6");
        assert_eq!(run("(/ 1 0)"), "<DivisionByZero>");
        assert_eq!(run("(+ 1 #t)"), "<WrongType>");
        assert_eq!(run("(* 9223372036854775807 2)"), "<IntegerOverflow>");
    }

    #[test]
    fn integer_division() {
        assert_eq!(run("(quotient 7 2)"), "3");
        assert_eq!(run("(quotient -7 2)"), "-4");
        assert_eq!(run("(modulo -7 2)"), "1");
        assert_eq!(run("(remainder -7 2)"), "-1");
        assert_eq!(run("(modulo 7.0 2)"), "1");
        assert_eq!(run("(quotient 1 0)"), "<DivisionByZero>");
        assert_eq!(run("(quotient 1.5 1)"), "<WrongType>");
        assert_eq!(run("(floor 5/2)"), "2");
        assert_eq!(run("(ceiling 2.1)"), "3");
    }

    #[test]
    fn comparisons_and_numeric_predicates() {
        assert_eq!(run("(< 1 2 3)"), "#t");
        assert_eq!(run("(< 1 3 2)"), "#f");
        assert_eq!(run("(= 1 1.0)"), "#t");
        assert_eq!(run("(>= 2 2 1)"), "#t");
        assert_eq!(run("(even? 4)"), "#t");
        assert_eq!(run("(odd? 4.0)"), "#f");
        assert_eq!(run("(zero? 0.0)"), "#t");
        assert_eq!(run("(negative? -1/2)"), "#t");
        assert_eq!(run("(even? 1.5)"), "<WrongType>");
    }

    #[test]
    fn predicates() {
        assert_eq!(run("(not 0)"), "#f");
        assert_eq!(run("(not #f)"), "#t");
        assert_eq!(run("(null? nil)"), "#t");
        assert_eq!(run("(list? '(1 . 2))"), "#f");
        assert_eq!(run("(pair? '(1 . 2))"), "#t");
        assert_eq!(run("(procedure? car)"), "#t");
        assert_eq!(run("(procedure? if)"), "#f");
        assert_eq!(run("(symbol? 'a)"), "#t");
        assert_eq!(run("(string? \"a\")"), "#t");
        assert_eq!(run("(integer? 2.0)"), "#t");
        assert_eq!(run("(boolean? '())"), "#f");
        assert_eq!(run("(eq? 'a 'a)"), "#t");
        assert_eq!(run("(eqv? '(1) '(1))"), "#f");
        assert_eq!(run("(equal? '(1 (2)) '(1 (2)))"), "#t");
    }

    #[test]
    fn lists() {
        assert_eq!(run("(cons 1 '(2))"), "(1 2)");
        assert_eq!(run("(car '(1 2))"), "1");
        assert_eq!(run("(cdr '(1 2))"), "(2)");
        assert_eq!(run("(car '())"), "<WrongType>");
        assert_eq!(run("(length '(1 2 3))"), "3");
        assert_eq!(run("(length 5)"), "<WrongType>");
        assert_eq!(run("(append '(1) '() '(2 3) 4)"), "(1 2 3 . 4)");
        assert_eq!(run("(append)"), "()");
        assert_eq!(run("(append '(1 . 2) '(3))"), "<WrongType>");
    }

    #[test]
    fn display_writes_to_the_port() {
        let mut context = EvaluationContext::with_output(OutputPort::captured());
        let value = context.evaluate_str("(display \"hi\") (newline) (display '(1 \"a\")) 5").map(|v| v.to_string());
        assert_eq!(value.as_deref(), Ok("5"));
        assert_eq!(context.take_output(), "hi\n(1 a)");
    }

    #[test]
    fn environments() {
        assert_eq!(run("(scheme-report-environment 4)"), "<InvalidArgument>");
        assert_eq!(run("(null-environment 5)"), "#[environment]");
        assert!(null_environment().lookup("car").is_err());
        assert!(report_environment().lookup("car").is_ok());
    }

    #[test]
    fn frame_contents() {
        let frame = builtin_frame();
        for name in ["define", "let*", "call/cc", "call-with-current-continuation", "reduce", "nil", "newline"] {
            assert!(frame.contains_key(name), "{} missing", name);
        }
        assert!(primitive("cons").is_ok());
        assert!(primitive("define").is_err());
    }
}
