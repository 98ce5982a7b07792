//! Canary engine error types.

use shoal_state::StateError;
use thiserror::Error;

/// Errors raised while validating or settling an operation.
#[derive(Debug, Error)]
pub enum CanaryError {
    /// Malformed request: out-of-range fraction, bad counts, invalid spec.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is illegal in the application's current op status.
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state error: {0}")]
    State(StateError),
}

impl From<StateError> for CanaryError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(what) => Self::NotFound(what),
            StateError::InvalidSpec(msg) => Self::InvalidArgument(msg),
            other => Self::State(other),
        }
    }
}

pub type CanaryResult<T> = Result<T, CanaryError>;
