//! Op-status gate: which operations are legal in which state.
//!
//! ```text
//! Noop             --create_canary-->  Busy --(tasks settled)-->  CanaryUnfinished
//! CanaryUnfinished --update_weights--> Busy --(weights applied)--> CanaryUnfinished
//! CanaryUnfinished --create_canary-->  StateConflict
//! any settled      --remove-->         Busy --(tasks retired)-->  deleted
//! ```
//!
//! Settling derives the status from the live task population, so a
//! partially failed canary that left only one live version lands in `Noop`.

use shoal_state::{Application, OpStatus, Operation};
use tracing::debug;

use crate::error::{CanaryError, CanaryResult};

/// Check that `operation` may start from the application's current status.
pub fn admit(app: &Application, operation: Operation) -> CanaryResult<()> {
    let status = app.op_status;
    let allowed = match (status, operation) {
        (OpStatus::Busy { .. }, _) => false,
        (OpStatus::Noop, Operation::Create) => app.versions.is_empty(),
        (_, Operation::Create) => false,
        (OpStatus::Noop, Operation::CreateCanary) => true,
        (OpStatus::CanaryUnfinished, Operation::UpdateWeights) => true,
        (_, Operation::Remove) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(CanaryError::StateConflict(format!(
            "application {} is {status}, cannot {operation}",
            app.id
        )))
    }
}

/// Admit `operation` and mark the application busy with it.
pub fn begin(app: &mut Application, operation: Operation) -> CanaryResult<()> {
    admit(app, operation)?;
    app.op_status = OpStatus::Busy { operation };
    app.touch();
    debug!(app = %app.id, %operation, "operation started");
    Ok(())
}

/// Leave the busy state for the status implied by the task population.
pub fn settle(app: &mut Application) -> OpStatus {
    let status = app.population_status();
    app.op_status = status;
    app.touch();
    debug!(app = %app.id, %status, "operation settled");
    status
}
