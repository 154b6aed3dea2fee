use thiserror::Error;


/// Every way evaluating (or reading) a form can fail. A failure aborts the
/// top-level form it happened in and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemeError {
    #[error("unbound variable: {0}")]
    Unbound(String),

    #[error("malformed special form: {0}")]
    MalformedSpecialForm(String),

    #[error("not applicable: {0}")]
    NotApplicable(String),

    #[error("{name}: expected {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{name}: expected {expected}, got {got}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("output error: {0}")]
    Output(String),

    #[error("step limit of {0} exceeded")]
    StepLimit(usize),
}

impl SchemeError {
    /// Stable name of the error kind, independent of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unbound(_) => "Unbound",
            Self::MalformedSpecialForm(_) => "MalformedSpecialForm",
            Self::NotApplicable(_) => "NotApplicable",
            Self::ArityMismatch { .. } => "ArityMismatch",
            Self::DivisionByZero => "DivisionByZero",
            Self::WrongType { .. } => "WrongType",
            Self::IntegerOverflow => "IntegerOverflow",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Syntax(_) => "Syntax",
            Self::UnexpectedEof => "UnexpectedEof",
            Self::Output(_) => "Output",
            Self::StepLimit(_) => "StepLimit",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedSpecialForm(message.into())
    }

    pub(crate) fn wrong_type(name: &str, expected: &'static str, got: impl ToString) -> Self {
        Self::WrongType { name: name.to_owned(), expected, got: got.to_string() }
    }
}

pub type SchemeResult<T> = Result<T, SchemeError>;
