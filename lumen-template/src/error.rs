use lumen_core::CallError;

/// Failure to turn template text into a render program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("invalid expression `{expression}`: {message}")]
    Expression { expression: String, message: String },

    #[error("malformed template at byte {offset}: {message}")]
    Structure { offset: usize, message: String },
}

/// Failure while evaluating a template expression during a render pass or
/// an event handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("cannot read property `{property}` of null")]
    NullAccess { property: String },

    #[error("`{0}` is not a function")]
    NotCallable(String),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("pipe `{name}` failed: {message}")]
    Pipe { name: String, message: String },

    #[error("cannot assign to `{0}`")]
    InvalidAssignment(String),
}

impl EvalError {
    pub fn pipe(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Pipe {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<EvalError> for CallError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Call(inner) => inner,
            other => CallError::msg(other.to_string()),
        }
    }
}
