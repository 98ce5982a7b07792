//! Canary controller: introduce a new version next to the running one.
//!
//! A canary redistributes existing capacity: `instances` tasks of the old
//! version are retired and the same number of new-version tasks launched,
//! so the declared task count never changes. Weights are applied once the
//! executor confirms the new population.

use shoal_state::{Application, CanaryRecord, OpStatus, Operation};
use tracing::{info, warn};

use crate::balancer::{compute_weight, validate_fraction};
use crate::dispatch::{BatchReport, Dispatch};
use crate::error::{CanaryError, CanaryResult};
use crate::gate;
use crate::request::CanaryUpdateRequest;
use crate::weights::apply_split;

/// Validate a canary request and record it on the application.
///
/// On success the application is `Busy` and the returned dispatch lists
/// the old tasks to retire and the new tasks to launch. Nothing is mutated
/// when validation fails.
pub fn plan_canary(app: &mut Application, req: &CanaryUpdateRequest) -> CanaryResult<Dispatch> {
    gate::admit(app, Operation::CreateCanary)?;
    validate_fraction(req.value)?;

    let total = app.desired_task_count;
    if req.instances == 0 || req.instances >= total {
        return Err(CanaryError::InvalidArgument(format!(
            "canary instances must be within [1, {}], got {}",
            total.saturating_sub(1),
            req.instances
        )));
    }
    req.version.validate()?;

    let old_version = match app.live_versions().as_slice() {
        [only] => only.id.clone(),
        live => {
            return Err(CanaryError::StateConflict(format!(
                "application {} has {} live versions, expected 1",
                app.id,
                live.len()
            )));
        }
    };
    let old_count = app.tasks.count_by_version(&old_version);
    if req.instances >= old_count {
        return Err(CanaryError::InvalidArgument(format!(
            "canary of {} would leave none of the {} old tasks running",
            req.instances, old_count
        )));
    }
    // Surface unrepresentable weights now rather than after the launch.
    compute_weight(req.instances, old_count - req.instances, req.value)?;

    let retire: Vec<_> = app
        .tasks
        .tasks_by_version(&old_version)
        .iter()
        .take(req.instances as usize)
        .map(|t| t.id.clone())
        .collect();
    let new_version = app.versions.append(req.version.clone());
    let launch = app.tasks.launch(&new_version, req.instances);
    app.canary = Some(CanaryRecord {
        new_version_id: new_version.clone(),
        old_version_id: old_version.clone(),
        instances: req.instances,
        value: req.value,
        on_failure: req.on_failure,
        delay_secs: req.delay,
    });
    gate::begin(app, Operation::CreateCanary)?;

    info!(
        app = %app.id,
        new_version = %new_version,
        old_version = %old_version,
        instances = req.instances,
        value = req.value,
        "canary planned"
    );

    Ok(Dispatch {
        operation: Operation::CreateCanary,
        version: app.versions.get(&new_version).cloned(),
        launch,
        retire,
    })
}

/// Fold the executor's report into the application and apply weights.
///
/// Weights are computed from the population that actually came up. A
/// canary whose launches all failed settles back to `Noop`.
pub fn settle_canary(app: &mut Application, report: &BatchReport) -> CanaryResult<OpStatus> {
    let outcome = apply_canary(app, report);
    let status = gate::settle(app);
    if status == OpStatus::Noop {
        app.canary = None;
    }
    outcome.map(|()| status)
}

fn apply_canary(app: &mut Application, report: &BatchReport) -> CanaryResult<()> {
    app.tasks.retire(&report.retired)?;
    app.tasks.retire(&report.failed_launch_ids())?;
    app.last_failure = report.failure(Operation::CreateCanary);

    let record = app
        .canary
        .clone()
        .ok_or_else(|| CanaryError::StateConflict(format!("no canary in flight for {}", app.id)))?;
    let weights = apply_split(
        app,
        &record.new_version_id,
        &record.old_version_id,
        record.value,
    )?;

    if report.is_partial() {
        warn!(
            app = %app.id,
            failed_launches = report.failed_launches.len(),
            failed_retires = report.failed_retires.len(),
            on_failure = ?record.on_failure,
            "canary settled with a partial population"
        );
    } else if let Some(w) = weights {
        info!(
            app = %app.id,
            new_weight = w.new_weight,
            old_weight = w.old_weight,
            "canary settled"
        );
    }
    Ok(())
}
