use std::io::Write;

use tracing::debug;

use crate::{
    builtin::builtin_frame,
    environment::Environment,
    error::{SchemeError, SchemeResult},
    interpreter::Machine,
    parser::parse_all,
    value::Value,
};


/// Where `display` and `newline` write.
#[derive(Debug)]
pub enum OutputPort {
    Stdout,
    Captured(String),
}

impl OutputPort {
    pub fn captured() -> Self {
        Self::Captured(String::new())
    }

    pub fn write_str(&mut self, text: &str) -> SchemeResult<()> {
        match self {
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|error| SchemeError::Output(error.to_string()))
            }
            Self::Captured(buffer) => {
                buffer.push_str(text);
                Ok(())
            }
        }
    }

    /// Drains captured text. Stdout keeps nothing to drain.
    pub fn take(&mut self) -> String {
        match self {
            Self::Stdout => String::new(),
            Self::Captured(buffer) => core::mem::take(buffer),
        }
    }
}

/// A session: one global environment that persists across top-level forms.
///
/// Each form is evaluated on its own. A failure aborts that form only;
/// definitions made by earlier forms (and by the failed form before it
/// failed) stay in place.
pub struct EvaluationContext {
    global: Environment,
    port: OutputPort,
    step_limit: Option<usize>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::with_output(OutputPort::Stdout)
    }

    pub fn with_output(port: OutputPort) -> Self {
        // User definitions go in a child of the builtin frame
        Self {
            global: Environment::root_with(builtin_frame()).extend(),
            port,
            step_limit: None,
        }
    }

    /// Fails any single top-level form that takes more than `limit` machine
    /// steps with `StepLimit`. Unlimited by default.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn global(&self) -> &Environment {
        &self.global
    }

    pub fn evaluate(&mut self, expression: &Value) -> SchemeResult<Value> {
        let result = Machine::new(&mut self.port, self.step_limit).run(expression.clone(), self.global.clone());
        if let Err(error) = &result {
            debug!(target: "skeme::session", kind = error.kind(), %error, "top-level form failed");
        }
        result
    }

    /// Evaluates every form in `input` and answers with the last value.
    /// Stops at the first error.
    pub fn evaluate_str(&mut self, input: &str) -> SchemeResult<Value> {
        parse_all(input)?.iter()
            .try_fold(Value::Unspecified, |_, expression| self.evaluate(expression))
    }

    /// Evaluates every form in `input`, one outcome per form. A syntax error
    /// in the input is the only outcome reported.
    pub fn evaluate_program(&mut self, input: &str) -> Vec<SchemeResult<Value>> {
        match parse_all(input) {
            Ok(expressions) => expressions.iter().map(|expression| self.evaluate(expression)).collect(),
            Err(error) => vec![Err(error)],
        }
    }

    pub fn take_output(&mut self) -> String {
        self.port.take()
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}
