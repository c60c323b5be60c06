//! Errors returned by worker bodies.

use thiserror::Error;

/// Error returned from a [`Worker`](super::Worker) body.
///
/// The variant decides how the supervising task reacts: contract violations
/// (`InvalidArgument`, `InvalidOperation`, `Unsupported`) stop the task, every
/// other error is retried after the policy delay.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The body observed cancellation and gave up early.
    #[error("Task cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Default retry classification.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidOperation(_) | Self::Unsupported(_)
        )
    }
}

impl From<crate::Error> for TaskError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Validation(msg) => Self::InvalidArgument(msg),
            crate::Error::Configuration(msg) => Self::InvalidOperation(msg),
            other => Self::Failed(other.to_string()),
        }
    }
}
