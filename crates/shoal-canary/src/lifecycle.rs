//! Application creation and removal.

use shoal_state::{Application, BASELINE_WEIGHT, OpStatus, Operation, VersionSpec};
use tracing::{info, warn};

use crate::dispatch::{BatchReport, Dispatch};
use crate::error::{CanaryError, CanaryResult};
use crate::gate;

/// Append the first version of a fresh application and register its tasks.
///
/// Nothing is mutated unless the request is valid and the application is
/// still fresh.
pub fn plan_create(app: &mut Application, spec: VersionSpec) -> CanaryResult<Dispatch> {
    if app.desired_task_count == 0 {
        return Err(CanaryError::InvalidArgument(
            "task count must be positive".to_string(),
        ));
    }
    spec.validate()?;

    // The gate only admits a create while the version history is empty.
    gate::begin(app, Operation::Create)?;
    let version_id = app.versions.append(spec);
    let launch = app.tasks.launch(&version_id, app.desired_task_count);

    Ok(Dispatch {
        operation: Operation::Create,
        version: app.versions.get(&version_id).cloned(),
        launch,
        retire: Vec::new(),
    })
}

/// Fold the executor's launch report into a freshly created application.
pub fn settle_create(app: &mut Application, report: &BatchReport) -> CanaryResult<OpStatus> {
    let outcome = apply_create(app, report);
    let status = gate::settle(app);
    outcome.map(|()| status)
}

fn apply_create(app: &mut Application, report: &BatchReport) -> CanaryResult<()> {
    app.tasks.retire(&report.failed_launch_ids())?;
    if let Some(version) = app.versions.latest() {
        let version_id = version.id.clone();
        app.tasks.set_weight(&version_id, BASELINE_WEIGHT);
    }
    app.last_failure = report.failure(Operation::Create);
    if app.last_failure.is_some() {
        warn!(
            app = %app.id,
            launched = report.launched.len(),
            failed = report.failed_launches.len(),
            "application created with a partial task population"
        );
    } else {
        info!(app = %app.id, tasks = app.tasks.len(), "application created");
    }
    Ok(())
}

/// Mark the application for removal and list every task to retire.
pub fn plan_remove(app: &mut Application) -> CanaryResult<Dispatch> {
    gate::begin(app, Operation::Remove)?;
    Ok(Dispatch {
        operation: Operation::Remove,
        version: None,
        launch: Vec::new(),
        retire: app.tasks.ids(),
    })
}

/// Fold the retire report. Returns `true` once no task is left alive.
///
/// When some retirements failed, the application settles back to the
/// status of its remaining population with the failure recorded.
pub fn settle_remove(app: &mut Application, report: &BatchReport) -> CanaryResult<bool> {
    app.tasks.retire(&report.retired)?;
    if app.tasks.is_empty() && !report.is_partial() {
        return Ok(true);
    }

    app.last_failure = report.failure(Operation::Remove);
    let status = gate::settle(app);
    warn!(
        app = %app.id,
        remaining = app.tasks.len(),
        %status,
        "removal left live tasks behind"
    );
    Ok(false)
}
