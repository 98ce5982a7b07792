//! Scheduler error types.
//!
//! This is the taxonomy callers see: every rejected request maps to a
//! distinct variant, so "rejected outright" is never confused with
//! "accepted, converging".

use std::time::Duration;

use shoal_canary::CanaryError;
use thiserror::Error;

/// Errors returned by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    #[error("partial failure: {0}")]
    PartialFailure(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("state store error: {0}")]
    State(#[from] shoal_state::StateError),
}

impl From<CanaryError> for SchedulerError {
    fn from(e: CanaryError) -> Self {
        match e {
            CanaryError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            CanaryError::StateConflict(msg) => Self::StateConflict(msg),
            CanaryError::NotFound(msg) => Self::NotFound(msg),
            CanaryError::State(e) => Self::State(e),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
