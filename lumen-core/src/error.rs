/// Failure raised by a callable [`Value`](crate::Value).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("{0}")]
    Message(String),

    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },

    #[error("expected {expected}, got {got}")]
    Type {
        expected: &'static str,
        got: &'static str,
    },
}

impl CallError {
    pub fn msg(message: impl Into<String>) -> Self {
        CallError::Message(message.into())
    }
}
