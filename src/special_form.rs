use std::rc::Rc;

use itertools::Itertools;
use tracing::trace;

use crate::{
    builtin::primitive,
    continuation::{Continuation, Pending},
    environment::Environment,
    error::{SchemeError, SchemeResult},
    interpreter::State,
    procedure::{Closure, Procedure},
    value::{Symbol, Value},
};


/// Forms whose operands are not evaluated like a call's.
///
/// Special forms are ordinary values bound in the global frame, so a program
/// can rebind, shadow or alias them like any other variable; the evaluator
/// recognizes one by the value its operator evaluates to, not by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    Quasiquote,
    If,
    Define,
    Set,
    Lambda,
    Let,
    LetStar,
    Begin,
    And,
    Or,
    Cond,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 12] = [
        Self::Quote, Self::Quasiquote, Self::If, Self::Define, Self::Set, Self::Lambda,
        Self::Let, Self::LetStar, Self::Begin, Self::And, Self::Or, Self::Cond,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Quasiquote => "quasiquote",
            Self::If => "if",
            Self::Define => "define",
            Self::Set => "set!",
            Self::Lambda => "lambda",
            Self::Let => "let",
            Self::LetStar => "let*",
            Self::Begin => "begin",
            Self::And => "and",
            Self::Or => "or",
            Self::Cond => "cond",
        }
    }

    /// Starts evaluating `(<form> . operands)`. The returned state either
    /// finishes the form or continues it through pending steps pushed on
    /// `continuation`.
    pub(crate) fn evaluate(self, operands: Value, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
        let arguments = operands.list_to_vec()
            .ok_or_else(|| SchemeError::malformed(format!("{}: improper operand list", self.name())))?;

        match self {
            Self::Quote => evaluate_quote(arguments),
            Self::Quasiquote => evaluate_quasiquote(arguments, environment),
            Self::If => evaluate_if(arguments, environment, continuation),
            Self::Define => evaluate_define(arguments, environment, continuation),
            Self::Set => evaluate_set_bang(arguments, environment, continuation),
            Self::Lambda => evaluate_lambda(arguments, environment),
            Self::Let => evaluate_let(arguments, environment, continuation),
            Self::LetStar => evaluate_let_star(arguments, environment, continuation),
            Self::Begin => evaluate_body(&operands, environment, continuation),
            Self::And => and_next(operands, environment, continuation),
            Self::Or => or_next(operands, environment, continuation),
            Self::Cond => evaluate_cond(operands, environment, continuation),
        }
    }
}

/// The part of a special form still to run once a subexpression's value
/// arrives.
#[derive(Clone)]
pub(crate) enum FormStep {
    Sequence { remaining: Value, environment: Environment },
    If { consequent: Value, alternative: Option<Value>, environment: Environment },
    Define { name: Symbol, environment: Environment },
    Set { name: Symbol, environment: Environment },
    Let {
        names: Rc<[Symbol]>,
        expressions: Rc<[Value]>,
        values: Vec<Value>,
        body: Value,
        environment: Environment,
    },
    LetStar {
        names: Rc<[Symbol]>,
        expressions: Rc<[Value]>,
        body: Value,
        environment: Environment,
    },
    And { remaining: Value, environment: Environment },
    Or { remaining: Value, environment: Environment },
    Cond { body: Value, remaining: Value, environment: Environment },
}

pub(crate) fn resume(step: FormStep, value: Value, continuation: &mut Continuation) -> SchemeResult<State> {
    match step {
        FormStep::Sequence { remaining, environment } => evaluate_body(&remaining, environment, continuation),
        FormStep::If { consequent, alternative, environment } => {
            if value.is_true() { return Ok(State::Evaluate(consequent, environment)) }
            Ok(match alternative {
                Some(alternative) => State::Evaluate(alternative, environment),
                None => State::Return(Value::Unspecified),
            })
        }
        FormStep::Define { name, environment } => {
            environment.define(name.clone(), value);
            Ok(State::Return(Value::Symbol(name)))
        }
        FormStep::Set { name, environment } => {
            environment.set(&name, value)?;
            Ok(State::Return(Value::Unspecified))
        }
        FormStep::Let { names, expressions, mut values, body, environment } => {
            values.push(value);
            let_next(names, expressions, values, body, environment, continuation)
        }
        FormStep::LetStar { names, expressions, body, environment } => {
            let bound = names.len() - expressions.len();
            let environment = environment.extend_with([(names[bound].clone(), value)]);
            let_star_next(names, expressions[1..].into(), body, environment, continuation)
        }
        FormStep::And { remaining, environment } => {
            if !value.is_true() { return Ok(State::Return(value)) }
            and_next(remaining, environment, continuation)
        }
        FormStep::Or { remaining, environment } => {
            if value.is_true() { return Ok(State::Return(value)) }
            or_next(remaining, environment, continuation)
        }
        FormStep::Cond { body, remaining, environment } => {
            if !value.is_true() { return cond_next(remaining, environment, continuation) }
            match body {
                Value::Nil => Ok(State::Return(value)),
                body => evaluate_body(&body, environment, continuation),
            }
        }
    }
}

/// Evaluates a non-empty body: every expression but the last for effect,
/// the last in tail position.
pub(crate) fn evaluate_body(body: &Value, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    match body {
        Value::Pair(pair) => {
            if matches!(pair.cdr, Value::Nil) {
                trace!(target: "skeme::machine", "tail position");
            } else {
                continuation.push(Pending::Form(FormStep::Sequence { remaining: pair.cdr.clone(), environment: environment.clone() }));
            }
            Ok(State::Evaluate(pair.car.clone(), environment))
        }
        _ => Err(SchemeError::malformed("empty body")),
    }
}

fn expect_operands(form: SpecialForm, arguments: &[Value], counts: &[usize]) -> SchemeResult<()> {
    if counts.contains(&arguments.len()) { return Ok(()) }
    Err(SchemeError::malformed(format!("{}: wrong number of operands ({})", form.name(), arguments.len())))
}

fn evaluate_quote(arguments: Vec<Value>) -> SchemeResult<State> {
    expect_operands(SpecialForm::Quote, &arguments, &[1])?;
    Ok(State::Return(arguments.into_iter().next().unwrap_or(Value::Nil)))
}

fn evaluate_if(arguments: Vec<Value>, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    // (if test consequent [alternative]); only the chosen branch is in tail position

    expect_operands(SpecialForm::If, &arguments, &[2, 3])?;
    let mut arguments = arguments.into_iter();
    let (Some(test), Some(consequent)) = (arguments.next(), arguments.next()) else {
        return Err(SchemeError::malformed("if: missing operands"));
    };

    continuation.push(Pending::Form(FormStep::If {
        consequent,
        alternative: arguments.next(),
        environment: environment.clone(),
    }));
    Ok(State::Evaluate(test, environment))
}

fn evaluate_define(arguments: Vec<Value>, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    // Either (define name expression), or the procedure shorthand
    // (define (name . parameters) body...) which binds a closure. Both
    // answer with the symbol that was bound.

    let Some((target, rest)) = arguments.split_first() else {
        return Err(SchemeError::malformed("define: missing operands"));
    };

    match target {
        Value::Symbol(name) => {
            let [expression] = rest else {
                return Err(SchemeError::malformed(format!("define: expected one value for {}, got {}", name, rest.len())));
            };
            continuation.push(Pending::Form(FormStep::Define { name: name.clone(), environment: environment.clone() }));
            Ok(State::Evaluate(expression.clone(), environment))
        }
        Value::Pair(header) => {
            let name = header.car.as_symbol()
                .ok_or_else(|| SchemeError::malformed(format!("define: {} is not a symbol", header.car)))?
                .clone();
            let closure = make_closure(Some(name.clone()), &header.cdr, rest, &environment)?;
            environment.define(name.clone(), closure);
            Ok(State::Return(Value::Symbol(name)))
        }
        other => Err(SchemeError::malformed(format!("define: cannot bind {}", other))),
    }
}

fn evaluate_set_bang(arguments: Vec<Value>, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    expect_operands(SpecialForm::Set, &arguments, &[2])?;
    let name = arguments[0].as_symbol()
        .ok_or_else(|| SchemeError::malformed(format!("set!: {} is not a symbol", arguments[0])))?
        .clone();

    continuation.push(Pending::Form(FormStep::Set { name, environment: environment.clone() }));
    Ok(State::Evaluate(arguments[1].clone(), environment))
}

fn evaluate_lambda(arguments: Vec<Value>, environment: Environment) -> SchemeResult<State> {
    let Some((parameters, body)) = arguments.split_first() else {
        return Err(SchemeError::malformed("lambda: missing parameter list"));
    };
    Ok(State::Return(make_closure(None, parameters, body, &environment)?))
}

/// Reads a parameter list: `(a b)`, `(a . rest)` or a lone `rest` symbol.
fn parse_parameters(parameters: &Value) -> SchemeResult<(Vec<Symbol>, Option<Symbol>)> {
    let mut iter = parameters.iter();
    let fixed = iter.by_ref()
        .map(|parameter| parameter.as_symbol().cloned()
            .ok_or_else(|| SchemeError::malformed(format!("parameter {} is not a symbol", parameter))))
        .collect::<SchemeResult<Vec<Symbol>>>()?;

    let rest = match iter.terminator() {
        Value::Nil => None,
        Value::Symbol(rest) => Some(rest.clone()),
        other => return Err(SchemeError::malformed(format!("parameter {} is not a symbol", other))),
    };

    if let Some(duplicate) = fixed.iter().chain(rest.iter()).duplicates().next() {
        return Err(SchemeError::malformed(format!("duplicate parameter {}", duplicate)));
    }

    Ok((fixed, rest))
}

fn make_closure(name: Option<Symbol>, parameters: &Value, body: &[Value], environment: &Environment) -> SchemeResult<Value> {
    if body.is_empty() { return Err(SchemeError::malformed("lambda: empty body")); }

    let (parameters, rest) = parse_parameters(parameters)?;
    Ok(Value::Procedure(Procedure::Closure(Rc::new(Closure {
        name,
        parameters,
        rest,
        body: Value::list(body.to_vec()),
        environment: environment.clone(),
    }))))
}

/// Splits `((name expression) ...)` into names and expressions.
fn parse_bindings(form: SpecialForm, bindings: &Value) -> SchemeResult<(Vec<Symbol>, Vec<Value>)> {
    let bindings = bindings.list_to_vec()
        .ok_or_else(|| SchemeError::malformed(format!("{}: bindings must be a list", form.name())))?;

    bindings.iter()
        .map(|binding| match binding.list_to_vec().as_deref() {
            Some([Value::Symbol(name), expression]) => Ok((name.clone(), expression.clone())),
            _ => Err(SchemeError::malformed(format!("{}: bad binding {}", form.name(), binding))),
        })
        .collect::<SchemeResult<Vec<_>>>()
        .map(|pairs| pairs.into_iter().unzip())
}

fn split_let(form: SpecialForm, arguments: &[Value]) -> SchemeResult<(Vec<Symbol>, Vec<Value>, Value)> {
    let [bindings, body @ ..] = arguments else {
        return Err(SchemeError::malformed(format!("{}: missing bindings", form.name())));
    };
    if body.is_empty() { return Err(SchemeError::malformed(format!("{}: empty body", form.name()))); }

    let (names, expressions) = parse_bindings(form, bindings)?;
    Ok((names, expressions, Value::list(body.to_vec())))
}

fn evaluate_let(arguments: Vec<Value>, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    // Every expression is evaluated in the enclosing environment, then all
    // names are bound at once in a single new frame

    let (names, expressions, body) = split_let(SpecialForm::Let, &arguments)?;
    if let Some(duplicate) = names.iter().duplicates().next() {
        return Err(SchemeError::malformed(format!("let: duplicate binding {}", duplicate)));
    }

    let_next(names.into(), expressions.into(), Vec::new(), body, environment, continuation)
}

fn let_next(
    names: Rc<[Symbol]>,
    expressions: Rc<[Value]>,
    values: Vec<Value>,
    body: Value,
    environment: Environment,
    continuation: &mut Continuation,
) -> SchemeResult<State> {
    let Some(expression) = expressions.get(values.len()).cloned() else {
        let frame = environment.extend_with(names.iter().cloned().zip(values));
        return evaluate_body(&body, frame, continuation);
    };

    continuation.push(Pending::Form(FormStep::Let { names, expressions, values, body, environment: environment.clone() }));
    Ok(State::Evaluate(expression, environment))
}

fn evaluate_let_star(arguments: Vec<Value>, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    // Each binding gets its own frame, so later expressions see earlier names

    let (names, expressions, body) = split_let(SpecialForm::LetStar, &arguments)?;
    let_star_next(names.into(), expressions.into(), body, environment.extend(), continuation)
}

/// `expressions` holds the not-yet-evaluated tail; the name for its first
/// entry sits at the same distance from the end of `names`.
fn let_star_next(
    names: Rc<[Symbol]>,
    expressions: Rc<[Value]>,
    body: Value,
    environment: Environment,
    continuation: &mut Continuation,
) -> SchemeResult<State> {
    let Some(expression) = expressions.first().cloned() else {
        return evaluate_body(&body, environment, continuation);
    };

    continuation.push(Pending::Form(FormStep::LetStar { names, expressions, body, environment: environment.clone() }));
    Ok(State::Evaluate(expression, environment))
}

fn and_next(remaining: Value, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    match remaining {
        Value::Nil => Ok(State::Return(Value::Boolean(true))),
        Value::Pair(pair) => {
            if !matches!(pair.cdr, Value::Nil) {
                continuation.push(Pending::Form(FormStep::And { remaining: pair.cdr.clone(), environment: environment.clone() }));
            }
            Ok(State::Evaluate(pair.car.clone(), environment))
        }
        _ => Err(SchemeError::malformed("and: improper operand list")),
    }
}

fn or_next(remaining: Value, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    match remaining {
        Value::Nil => Ok(State::Return(Value::Boolean(false))),
        Value::Pair(pair) => {
            if !matches!(pair.cdr, Value::Nil) {
                continuation.push(Pending::Form(FormStep::Or { remaining: pair.cdr.clone(), environment: environment.clone() }));
            }
            Ok(State::Evaluate(pair.car.clone(), environment))
        }
        _ => Err(SchemeError::malformed("or: improper operand list")),
    }
}

fn evaluate_cond(clauses: Value, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    // Check every clause up front so a malformed one fails before any test runs

    let mut iter = clauses.iter().peekable();
    while let Some(clause) = iter.next() {
        let Some(Value::Pair(pair)) = clause.is_list().then_some(clause) else {
            return Err(SchemeError::malformed(format!("cond: bad clause {}", clause)));
        };
        if pair.car.is_symbol("else") && (iter.peek().is_some() || matches!(pair.cdr, Value::Nil)) {
            return Err(SchemeError::malformed("cond: else must be the last clause and have a body"));
        }
    }

    cond_next(clauses, environment, continuation)
}

fn cond_next(clauses: Value, environment: Environment, continuation: &mut Continuation) -> SchemeResult<State> {
    let Value::Pair(clauses) = clauses else {
        return Ok(State::Return(Value::Unspecified));
    };
    let Value::Pair(clause) = &clauses.car else {
        return Err(SchemeError::malformed(format!("cond: bad clause {}", clauses.car)));
    };

    if clause.car.is_symbol("else") {
        return evaluate_body(&clause.cdr, environment, continuation);
    }

    continuation.push(Pending::Form(FormStep::Cond {
        body: clause.cdr.clone(),
        remaining: clauses.cdr.clone(),
        environment: environment.clone(),
    }));
    Ok(State::Evaluate(clause.car.clone(), environment))
}

fn evaluate_quasiquote(arguments: Vec<Value>, environment: Environment) -> SchemeResult<State> {
    expect_operands(SpecialForm::Quasiquote, &arguments, &[1])?;
    Ok(State::Evaluate(expand_quasiquote(&arguments[0], 1, 0)?, environment))
}

fn quoted(datum: Value) -> Value {
    Value::list(vec![Value::SpecialForm(SpecialForm::Quote), datum])
}

fn call(name: &str, arguments: Vec<Value>) -> SchemeResult<Value> {
    Ok(Value::cons(Value::Procedure(primitive(name)?), Value::list(arguments)))
}

// Templates are expanded recursively through nested elements only; list
// spines are walked in a loop
const MAX_TEMPLATE_NESTING: usize = 1024;

fn is_template_keyword(value: &Value) -> bool {
    ["quasiquote", "unquote", "unquote-splicing"].iter().any(|keyword| value.is_symbol(keyword))
}

fn single_operand(keyword: &str, operands: &Value) -> SchemeResult<Value> {
    match operands.list_to_vec().as_deref() {
        Some([operand]) => Ok(operand.clone()),
        _ => Err(SchemeError::malformed(format!("{}: expected exactly one operand", keyword))),
    }
}

/// Rewrites a quasiquote template into an expression that builds it.
///
/// The expansion refers to `cons`, `list`, `append` and `quote` by value,
/// so rebinding those names in the program does not change its meaning.
fn expand_quasiquote(template: &Value, depth: usize, nesting: usize) -> SchemeResult<Value> {
    if nesting > MAX_TEMPLATE_NESTING {
        return Err(SchemeError::malformed("quasiquote: template nested too deeply"));
    }
    let Value::Pair(pair) = template else {
        return Ok(quoted(template.clone()));
    };

    if pair.car.is_symbol("unquote") {
        let operand = single_operand("unquote", &pair.cdr)?;
        if depth == 1 { return Ok(operand); }
        return call("list", vec![quoted(Value::symbol("unquote")), expand_quasiquote(&operand, depth - 1, nesting + 1)?]);
    }

    if pair.car.is_symbol("quasiquote") {
        let operand = single_operand("quasiquote", &pair.cdr)?;
        return call("list", vec![quoted(Value::symbol("quasiquote")), expand_quasiquote(&operand, depth + 1, nesting + 1)?]);
    }

    if pair.car.is_symbol("unquote-splicing") {
        let operand = single_operand("unquote-splicing", &pair.cdr)?;
        if depth == 1 { return Err(SchemeError::malformed("unquote-splicing: not inside a list")); }
        return call("list", vec![quoted(Value::symbol("unquote-splicing")), expand_quasiquote(&operand, depth - 1, nesting + 1)?]);
    }

    // Collect the elements up to the list's tail, which is either a
    // non-pair or an unquote form in dotted position such as `(a . ,b)`
    let mut elements = vec![];
    let mut rest = template;
    while let Value::Pair(cell) = rest {
        if !elements.is_empty() && is_template_keyword(&cell.car) { break; }
        elements.push(&cell.car);
        rest = &cell.cdr;
    }

    let mut expansion = match rest {
        Value::Pair(_) => expand_quasiquote(rest, depth, nesting + 1)?,
        other => quoted(other.clone()),
    };
    for element in elements.into_iter().rev() {
        expansion = match element {
            Value::Pair(head) if depth == 1 && head.car.is_symbol("unquote-splicing") => {
                call("append", vec![single_operand("unquote-splicing", &head.cdr)?, expansion])?
            }
            element => call("cons", vec![expand_quasiquote(element, depth, nesting + 1)?, expansion])?,
        };
    }
    Ok(expansion)
}

#[cfg(test)]
mod tests {
    use crate::{context::{EvaluationContext, OutputPort}, parser::parse};

    use super::*;

    fn run(source: &str) -> SchemeResult<String> {
        let mut context = EvaluationContext::with_output(OutputPort::captured());
        context.evaluate_str(source).map(|value| value.to_string())
    }

    fn kind(source: &str) -> Option<&'static str> {
        run(source).err().map(|error| error.kind())
    }

    #[test]
    fn define_echoes_the_bound_symbol() {
        assert_eq!(run("(define x 3)").as_deref(), Ok("x"));
        assert_eq!(run("(define (f a) a)").as_deref(), Ok("f"));
        assert_eq!(run("(define x 3) x").as_deref(), Ok("3"));
        assert_eq!(run("(define (f . args) args) (f 1 2)").as_deref(), Ok("(1 2)"));
    }

    #[test]
    fn malformed_forms_are_reported_as_such() {
        for source in [
            "(define 4 5)",
            "(define x 1 2)",
            "(define x)",
            "(define (f))",
            "(define (3 a) a)",
            "(lambda (x y x) 3)",
            "(lambda (x 1) 3)",
            "(lambda (x))",
            "(if #t)",
            "(if #t 1 2 3)",
            "(quote)",
            "(quote 1 2)",
            "(let ((x)) x)",
            "(let ((x 1) (x 2)) x)",
            "(let ((x 1)))",
            "(let* x 1)",
            "(begin)",
            "(set! 1 2)",
            "(cond (else 1) (#t 2))",
            "(cond 1)",
            "(and . 1)",
        ] {
            assert_eq!(kind(source), Some("MalformedSpecialForm"), "{}", source);
        }
    }

    #[test]
    fn if_chooses_one_branch() {
        assert_eq!(run("(if 0 1 2)").as_deref(), Ok("1"));
        assert_eq!(run("(if '() 1 2)").as_deref(), Ok("1"));
        assert_eq!(run("(if nil 1 2)").as_deref(), Ok("1"));
        assert_eq!(run("(if #f (car 1) 2)").as_deref(), Ok("2"));
        assert_eq!(run("(if #f #f)").as_deref(), Ok("okay"));
    }

    #[test]
    fn let_binds_simultaneously() {
        assert_eq!(run("(let* ((x 3) (y x)) (- x y))").as_deref(), Ok("0"));
        assert_eq!(kind("(let ((x 3) (y x)) (- x y))"), Some("Unbound"));
        assert_eq!(run("(define x 10) (let ((x 3) (y x)) (- x y))").as_deref(), Ok("-7"));
        assert_eq!(run("(let* ((x 1) (x (+ x 1))) x)").as_deref(), Ok("2"));
        assert_eq!(run("(let () 5)").as_deref(), Ok("5"));
    }

    #[test]
    fn and_or_short_circuit() {
        assert_eq!(run("(and #f (/ 1 0))").as_deref(), Ok("#f"));
        assert_eq!(kind("(and #t (/ 1 0))"), Some("DivisionByZero"));
        assert_eq!(run("(or 3 (/ 1 0))").as_deref(), Ok("3"));
        assert_eq!(kind("(or #f (/ 1 0))"), Some("DivisionByZero"));
        assert_eq!(run("(and)").as_deref(), Ok("#t"));
        assert_eq!(run("(or)").as_deref(), Ok("#f"));
        assert_eq!(run("(and 1 2 'three)").as_deref(), Ok("three"));
        assert_eq!(run("(or #f #f)").as_deref(), Ok("#f"));
    }

    #[test]
    fn cond_clauses() {
        assert_eq!(run("(cond (#f 1) ((+ 1 1)) (else 3))").as_deref(), Ok("2"));
        assert_eq!(run("(cond ((= 1 2) 1) (else 'a 'b))").as_deref(), Ok("b"));
        assert_eq!(run("(cond (#f 1))").as_deref(), Ok("okay"));
    }

    #[test]
    fn set_needs_an_existing_binding() {
        assert_eq!(run("(define x 1) (set! x 2) x").as_deref(), Ok("2"));
        assert_eq!(kind("(set! undefined-name 2)"), Some("Unbound"));
    }

    #[test]
    fn quasiquote_templates() {
        assert_eq!(run("(define x 2) `(1 ,x ,@(list 3 4) 5)").as_deref(), Ok("(1 2 3 4 5)"));
        assert_eq!(run("`(a . ,(+ 1 2))").as_deref(), Ok("(a . 3)"));
        assert_eq!(run("`(1 `(2 ,(3 ,(+ 1 3))))").as_deref(), Ok("(1 (quasiquote (2 (unquote (3 4)))))"));
        assert_eq!(kind("`,@(list 1)"), Some("MalformedSpecialForm"));
        assert_eq!(run("(define cons 0) `(,cons b)").as_deref(), Ok("(0 b)"));
    }

    #[test]
    fn long_templates_expand_and_deep_ones_are_refused() {
        let long = format!("(length `({} ,(+ 1 1)))", "a ".repeat(100_000));
        assert_eq!(run(&long).as_deref(), Ok("100001"));

        let deep = format!("`{}x{}", "(".repeat(2000), ")".repeat(2000));
        assert_eq!(kind(&deep), Some("MalformedSpecialForm"));
    }

    #[test]
    fn parameter_parsing() -> SchemeResult<()> {
        let (fixed, rest) = parse_parameters(&parse("(a b . c)")?)?;
        assert_eq!(fixed.len(), 2);
        assert_eq!(rest.as_deref(), Some("c"));

        let (fixed, rest) = parse_parameters(&parse("args")?)?;
        assert!(fixed.is_empty());
        assert_eq!(rest.as_deref(), Some("args"));

        assert!(parse_parameters(&parse("(a . a)")?).is_err());
        Ok(())
    }
}
