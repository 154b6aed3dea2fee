mod builtin;
mod context;
mod continuation;
mod environment;
mod error;
mod interpreter;
mod number;
mod parser;
mod procedure;
mod special_form;
mod value;

#[cfg(test)]
mod test_utils;

pub use builtin::{builtin_frame, null_environment, report_environment};
pub use context::{EvaluationContext, OutputPort};
pub use continuation::Continuation;
pub use environment::Environment;
pub use error::{SchemeError, SchemeResult};
pub use number::Number;
pub use parser::{parse, parse_all};
pub use procedure::{Arity, Closure, Control, Primitive, Procedure};
pub use special_form::SpecialForm;
pub use value::{Pair, Symbol, Value};
