//! Error types raised by the delayed-response controller.
//!
//! Application failures travel as [`anyhow::Error`]; the controller's own
//! failures are [`DelayError`] and can be recovered from an `anyhow::Error`
//! with `downcast_ref::<DelayError>()`.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the controller itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DelayError {
    /// A required collaborator was not supplied at construction.
    #[error("invalid argument: {0} is required")]
    InvalidArgument(&'static str),

    /// `wait` or `start` was invoked a second time on the same instance.
    #[error("delayed response already started")]
    AlreadyStarted,

    /// The idle timeout elapsed before the response was finalized.
    #[error("delayed response timed out after {0:?}")]
    Timeout(Duration),
}

impl DelayError {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DelayError::InvalidArgument(_) => "invalid_argument",
            DelayError::AlreadyStarted => "already_started",
            DelayError::Timeout(_) => "timeout",
        }
    }

    /// True when the error came from the idle timer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DelayError::Timeout(_))
    }
}
