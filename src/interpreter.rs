use tracing::trace;

use crate::{
    context::OutputPort,
    continuation::{Continuation, Pending},
    environment::Environment,
    error::{SchemeError, SchemeResult},
    procedure::{Control, Procedure},
    special_form::{self, evaluate_body},
    value::Value,
};


/// What the machine does next.
pub(crate) enum State {
    /// Evaluate an expression. Tail positions hand their expression back in
    /// this state instead of pushing pending work, which keeps the stack flat.
    Evaluate(Value, Environment),

    /// Deliver a value to the innermost pending work.
    Return(Value),

    /// Call a procedure with evaluated arguments.
    Apply(Procedure, Vec<Value>),
}

/// Steps of the control procedures that call back into user code.
#[derive(Clone)]
pub(crate) enum ControlStep {
    Map { procedure: Procedure, remaining: Value, mapped: Vec<Value> },
    Filter { procedure: Procedure, candidate: Value, remaining: Value, kept: Vec<Value> },
    ForEach { procedure: Procedure, remaining: Value },
    Reduce { procedure: Procedure, remaining: Value },
}

// Evaluation runs as a loop over `State`, with every piece of pending work
// kept in `continuation` rather than on the native stack. Neither tail calls
// nor deep non-tail recursion grow the native stack, and capturing the rest of
// the computation is a clone of the continuation.
pub(crate) struct Machine<'p> {
    continuation: Continuation,
    port: &'p mut OutputPort,
    step_limit: Option<usize>,
}

impl<'p> Machine<'p> {
    pub(crate) fn new(port: &'p mut OutputPort, step_limit: Option<usize>) -> Self {
        Self { continuation: Continuation::halt(), port, step_limit }
    }

    /// Evaluates one top-level expression to completion. An error abandons
    /// whatever work was pending for it.
    pub(crate) fn run(&mut self, expression: Value, environment: Environment) -> SchemeResult<Value> {
        let mut state = State::Evaluate(expression, environment);
        let mut steps = 0usize;
        loop {
            steps += 1;
            if let Some(limit) = self.step_limit.filter(|&limit| steps > limit) {
                self.continuation = Continuation::halt();
                return Err(SchemeError::StepLimit(limit));
            }

            let next = match state {
                State::Evaluate(expression, environment) => self.evaluate(expression, environment),
                State::Return(value) => match self.continuation.pop() {
                    Some(pending) => self.resume(pending, value),
                    None => return Ok(value),
                },
                State::Apply(procedure, arguments) => self.apply(procedure, arguments),
            };

            state = match next {
                Ok(next) => next,
                Err(error) => {
                    self.continuation = Continuation::halt();
                    return Err(error);
                }
            };
        }
    }

    fn evaluate(&mut self, expression: Value, environment: Environment) -> SchemeResult<State> {
        match expression {
            Value::Symbol(name) => Ok(State::Return(environment.lookup(&name)?)),
            Value::Pair(pair) => {
                self.continuation.push(Pending::Operator { operands: pair.cdr.clone(), environment: environment.clone() });
                Ok(State::Evaluate(pair.car.clone(), environment))
            }
            Value::Nil => Err(SchemeError::Syntax("() is not a valid expression".to_owned())),
            other => Ok(State::Return(other)),
        }
    }

    fn dispatch(&mut self, operator: Value, operands: Value, environment: Environment) -> SchemeResult<State> {
        // The operator decides how the operands are treated: a special form
        // receives them unevaluated, a procedure receives their values

        match operator {
            Value::SpecialForm(form) => form.evaluate(operands, environment, &mut self.continuation),
            Value::Procedure(procedure) => self.evaluate_operands(procedure, Vec::new(), operands, environment),
            other => Err(SchemeError::NotApplicable(other.to_string())),
        }
    }

    fn evaluate_operands(
        &mut self,
        procedure: Procedure,
        mut evaluated: Vec<Value>,
        mut remaining: Value,
        environment: Environment,
    ) -> SchemeResult<State> {
        // Operands that need no machine steps are evaluated in place; the first
        // combination found suspends the loop until its value comes back

        loop {
            let pair = match remaining {
                Value::Nil => return Ok(State::Apply(procedure, evaluated)),
                Value::Pair(pair) => pair,
                other => return Err(SchemeError::Syntax(format!("improper operand list ending in {}", other))),
            };

            match &pair.car {
                Value::Pair(_) => {
                    self.continuation.push(Pending::Operands {
                        procedure,
                        evaluated,
                        remaining: pair.cdr.clone(),
                        environment: environment.clone(),
                    });
                    return Ok(State::Evaluate(pair.car.clone(), environment));
                }
                Value::Symbol(name) => evaluated.push(environment.lookup(name)?),
                Value::Nil => return Err(SchemeError::Syntax("() is not a valid expression".to_owned())),
                literal => evaluated.push(literal.clone()),
            }
            remaining = pair.cdr.clone();
        }
    }

    fn resume(&mut self, pending: Pending, value: Value) -> SchemeResult<State> {
        match pending {
            Pending::Operator { operands, environment } => self.dispatch(value, operands, environment),
            Pending::Operands { procedure, mut evaluated, remaining, environment } => {
                evaluated.push(value);
                self.evaluate_operands(procedure, evaluated, remaining, environment)
            }
            Pending::Form(step) => special_form::resume(step, value, &mut self.continuation),
            Pending::Control(step) => self.resume_control(step, value),
        }
    }

    fn apply(&mut self, procedure: Procedure, mut arguments: Vec<Value>) -> SchemeResult<State> {
        procedure.arity().check(procedure.name(), arguments.len())?;

        match procedure {
            Procedure::Closure(closure) => {
                trace!(target: "skeme::machine", closure = closure.name.as_deref().unwrap_or("lambda"), "entering closure");
                let environment = closure.bind(arguments)?;
                evaluate_body(&closure.body, environment, &mut self.continuation)
            }
            Procedure::Primitive(primitive) => Ok(State::Return((primitive.function)(arguments, self.port)?)),
            Procedure::Continuation(continuation) => {
                trace!(target: "skeme::machine", depth = continuation.depth(), "resuming continuation");
                self.continuation = continuation;
                Ok(State::Return(arguments.pop().unwrap_or(Value::Unspecified)))
            }
            Procedure::Control(control) => self.apply_control(control, arguments),
        }
    }

    fn apply_control(&mut self, control: Control, mut arguments: Vec<Value>) -> SchemeResult<State> {
        let name = control.name();

        match control {
            Control::Apply => {
                // (apply f a b ... list) calls f with a, b, ... and the list's elements
                let last = arguments.pop().unwrap_or(Value::Nil);
                let spread = last.list_to_vec().ok_or_else(|| SchemeError::wrong_type(name, "list", &last))?;
                let procedure = as_procedure(name, arguments.remove(0))?;
                arguments.extend(spread);
                Ok(State::Apply(procedure, arguments))
            }
            Control::Eval => {
                let [expression, environment] = take(name, arguments)?;
                match environment {
                    Value::Environment(environment) => Ok(State::Evaluate(expression, environment)),
                    other => Err(SchemeError::wrong_type(name, "environment", other)),
                }
            }
            Control::CallCc => {
                let [receiver] = take(name, arguments)?;
                let receiver = as_procedure(name, receiver)?;
                let captured = self.continuation.clone();
                trace!(target: "skeme::machine", depth = captured.depth(), "capturing continuation");
                Ok(State::Apply(receiver, vec![Value::Procedure(Procedure::Continuation(captured))]))
            }
            Control::Map => {
                let [procedure, list] = take(name, arguments)?;
                self.map_next(as_procedure(name, procedure)?, proper_list(name, list)?, Vec::new())
            }
            Control::Filter => {
                let [procedure, list] = take(name, arguments)?;
                self.filter_next(as_procedure(name, procedure)?, proper_list(name, list)?, Vec::new())
            }
            Control::ForEach => {
                let [procedure, list] = take(name, arguments)?;
                self.for_each_next(as_procedure(name, procedure)?, proper_list(name, list)?)
            }
            Control::Reduce => {
                let [procedure, list, initial] = take(name, arguments)?;
                self.reduce_next(as_procedure(name, procedure)?, proper_list(name, list)?, initial)
            }
        }
    }

    fn resume_control(&mut self, step: ControlStep, value: Value) -> SchemeResult<State> {
        match step {
            ControlStep::Map { procedure, remaining, mut mapped } => {
                mapped.push(value);
                self.map_next(procedure, remaining, mapped)
            }
            ControlStep::Filter { procedure, candidate, remaining, mut kept } => {
                if value.is_true() { kept.push(candidate); }
                self.filter_next(procedure, remaining, kept)
            }
            ControlStep::ForEach { procedure, remaining } => self.for_each_next(procedure, remaining),
            ControlStep::Reduce { procedure, remaining } => self.reduce_next(procedure, remaining, value),
        }
    }

    fn map_next(&mut self, procedure: Procedure, remaining: Value, mapped: Vec<Value>) -> SchemeResult<State> {
        let Value::Pair(pair) = remaining else { return Ok(State::Return(Value::list(mapped))) };
        self.continuation.push(Pending::Control(ControlStep::Map {
            procedure: procedure.clone(),
            remaining: pair.cdr.clone(),
            mapped,
        }));
        Ok(State::Apply(procedure, vec![pair.car.clone()]))
    }

    fn filter_next(&mut self, procedure: Procedure, remaining: Value, kept: Vec<Value>) -> SchemeResult<State> {
        let Value::Pair(pair) = remaining else { return Ok(State::Return(Value::list(kept))) };
        self.continuation.push(Pending::Control(ControlStep::Filter {
            procedure: procedure.clone(),
            candidate: pair.car.clone(),
            remaining: pair.cdr.clone(),
            kept,
        }));
        Ok(State::Apply(procedure, vec![pair.car.clone()]))
    }

    fn for_each_next(&mut self, procedure: Procedure, remaining: Value) -> SchemeResult<State> {
        let Value::Pair(pair) = remaining else { return Ok(State::Return(Value::Unspecified)) };
        self.continuation.push(Pending::Control(ControlStep::ForEach { procedure: procedure.clone(), remaining: pair.cdr.clone() }));
        Ok(State::Apply(procedure, vec![pair.car.clone()]))
    }

    fn reduce_next(&mut self, procedure: Procedure, remaining: Value, accumulator: Value) -> SchemeResult<State> {
        let Value::Pair(pair) = remaining else { return Ok(State::Return(accumulator)) };
        self.continuation.push(Pending::Control(ControlStep::Reduce { procedure: procedure.clone(), remaining: pair.cdr.clone() }));
        Ok(State::Apply(procedure, vec![accumulator, pair.car.clone()]))
    }
}

fn take<const N: usize>(name: &str, arguments: Vec<Value>) -> SchemeResult<[Value; N]> {
    <[Value; N]>::try_from(arguments).map_err(|arguments| SchemeError::ArityMismatch {
        name: name.to_owned(),
        expected: N.to_string(),
        got: arguments.len(),
    })
}

fn as_procedure(name: &str, value: Value) -> SchemeResult<Procedure> {
    match value {
        Value::Procedure(procedure) => Ok(procedure),
        other => Err(SchemeError::wrong_type(name, "procedure", other)),
    }
}

fn proper_list(name: &str, value: Value) -> SchemeResult<Value> {
    if value.is_list() { return Ok(value) }
    Err(SchemeError::wrong_type(name, "list", value))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use itertools::Itertools;

    use crate::context::{EvaluationContext, OutputPort};

    fn outcomes(source: &str) -> String {
        let mut context = EvaluationContext::with_output(OutputPort::captured());
        context.evaluate_program(source)
            .into_iter()
            .map(|outcome| match outcome {
                Ok(value) => value.to_string(),
                Err(error) => format!("<{}>", error.kind()),
            })
            .join(" ")
    }

    #[test]
    fn tail_calls_run_in_constant_stack() {
        let program = "
            (define (sum n total) (if (= n 0) total (sum (- n 1) (+ n total))))
            (sum 1001 0)
            (sum 300000 0)";
        assert_eq!(outcomes(program), "sum 501501 45000150000");
    }

    #[test]
    fn mutual_tail_recursion() {
        let program = "
            (define (even n) (if (= n 0) #t (odd (- n 1))))
            (define (odd n) (if (= n 0) #f (even (- n 1))))
            (even 100001)";
        assert_eq!(outcomes(program), "even odd #f");
    }

    #[test]
    fn deep_non_tail_recursion_does_not_use_the_native_stack() {
        let program = "
            (define (count n) (if (= n 0) 0 (+ 1 (count (- n 1)))))
            (count 100000)";
        assert_eq!(outcomes(program), "count 100000");
    }

    #[test]
    fn deeply_nested_data_does_not_exhaust_the_stack() {
        let program = "
            (define (nest n acc) (if (= n 0) acc (nest (- n 1) (list acc))))
            (define deep (nest 100000 '()))
            (equal? deep (nest 100000 '()))
            (length (car deep))
            (define deep 0)";
        assert_eq!(outcomes(program), "nest deep #t 1 deep");
    }

    #[test]
    fn step_limit_stops_runaway_forms() {
        let mut context = EvaluationContext::with_output(OutputPort::captured()).with_step_limit(10_000);
        let results = context.evaluate_program("(define (spin) (spin)) (spin) (+ 1 2)")
            .into_iter()
            .map(|outcome| outcome.map_or_else(|error| error.kind().to_owned(), |value| value.to_string()))
            .join(" ");
        assert_eq!(results, "spin StepLimit 3");
    }

    #[test]
    fn operator_is_evaluated_before_dispatch() {
        assert_eq!(outcomes("((if #f + append) '(1) '(2))"), "(1 2)");
        assert_eq!(outcomes("((lambda (x) (* x x)) 7)"), "49");
        assert_eq!(outcomes("(apply (if #f + append) '((1) (2)))"), "(1 2)");
    }

    #[test]
    fn application_errors() {
        assert_eq!(outcomes("(1 2 3)"), "<NotApplicable>");
        assert_eq!(outcomes("((lambda (x) x))"), "<ArityMismatch>");
        assert_eq!(outcomes("(car 1 2)"), "<ArityMismatch>");
        assert_eq!(outcomes("(+ 1 'a)"), "<WrongType>");
        assert_eq!(outcomes("(undefined 1)"), "<Unbound>");
        assert_eq!(outcomes("()"), "<Syntax>");
    }

    #[test]
    fn errors_leave_earlier_definitions_intact() {
        assert_eq!(outcomes("(define x 1) (define y (/ x 0)) x y"), "x <DivisionByZero> 1 <Unbound>");
    }

    #[test]
    fn continuations_are_multi_shot() {
        let program = "
            (define cell 0)
            (define saved #f)
            (define (capture) (call/cc (lambda (k) (set! saved k) 1)))
            (set! cell (capture))
            cell
            (saved 3)
            cell
            (saved 4)
            cell
            (saved 'a)
            cell";
        assert_eq!(outcomes(program), "cell saved capture okay 1 okay 3 okay 4 okay a");
    }

    #[test]
    fn escaping_continuation_abandons_pending_work() {
        assert_eq!(outcomes("(+ 1 (call/cc (lambda (k) (+ 10 (k 2)))))"), "3");
        assert_eq!(outcomes("(call-with-current-continuation (lambda (k) 5))"), "5");
        assert_eq!(outcomes("(+ 1 (call/cc (lambda (k) (k 1 2))))"), "<ArityMismatch>");
    }

    #[test]
    fn continuations_captured_in_callbacks_are_reentrant() {
        let program = "
            (define k #f)
            (define result (map (lambda (x) (call/cc (lambda (c) (if (= x 2) (set! k c)) x))) '(1 2 3)))
            (define first result)
            (k 20)
            (list first result)";
        assert_eq!(outcomes(program), "k result first result ((1 2 3) (1 20 3))");
    }

    #[test]
    fn higher_order_procedures() {
        assert_eq!(outcomes("(map (lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
        assert_eq!(outcomes("(filter odd? '(1 2 3 4 5))"), "(1 3 5)");
        assert_eq!(outcomes("(reduce + '(1 2 3 4) 0)"), "10");
        assert_eq!(outcomes("(reduce cons '(1 2) '())"), "((() . 1) . 2)");
        assert_eq!(outcomes("(for-each display '(1 2))"), "okay");
        assert_eq!(outcomes("(map car 5)"), "<WrongType>");
        assert_eq!(outcomes("(map 5 '(1))"), "<WrongType>");
        assert_eq!(outcomes("(apply + 1 2 '(3 4))"), "10");
    }

    #[test]
    fn eval_in_an_environment() {
        assert_eq!(outcomes("(eval '(+ 1 2) (scheme-report-environment 5))"), "3");
        assert_eq!(outcomes("(define x 4) (eval 'x (scheme-report-environment 5))"), "x <Unbound>");
        assert_eq!(outcomes("(eval '(if #t 1 2) (null-environment 5))"), "1");
        assert_eq!(outcomes("(eval 1 2)"), "<WrongType>");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().map_err(|_| std::io::Error::other("log buffer poisoned"))?.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn machine_steps_are_traced() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let program = "(define (f n) (if (= n 0) 'done (f (- n 1)))) (f 3) (call/cc (lambda (k) (k 1)))";
        let result = tracing::subscriber::with_default(subscriber, || outcomes(program));
        assert_eq!(result, "f done 1");

        let log = buffer.0.lock().map(|bytes| String::from_utf8_lossy(&bytes).into_owned()).unwrap_or_default();
        for message in ["entering closure", "tail position", "capturing continuation", "resuming continuation"] {
            assert!(log.contains(message), "missing {:?} in {}", message, log);
        }
    }
}
