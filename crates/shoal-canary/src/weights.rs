//! Weight update controller: shift traffic between the two live versions.
//!
//! No tasks are launched or retired: the newer live version's weight is
//! recomputed from current task counts and the requested fraction, and
//! the application stays `CanaryUnfinished` even at a full cutover.

use shoal_state::{Application, BASELINE_WEIGHT, Operation};
use tracing::info;

use crate::balancer::{Weights, compute_weight, validate_fraction};
use crate::error::{CanaryError, CanaryResult};
use crate::gate;
use crate::request::WeightUpdateRequest;

/// Rebalance the two live versions of `app` to `req.value`.
pub fn update_weights(app: &mut Application, req: &WeightUpdateRequest) -> CanaryResult<Weights> {
    gate::admit(app, Operation::UpdateWeights)?;
    validate_fraction(req.value)?;

    let (new_version, old_version) = match app.live_versions().as_slice() {
        [newer, older] => (newer.id.clone(), older.id.clone()),
        live => {
            return Err(CanaryError::StateConflict(format!(
                "application {} has {} live versions, expected 2",
                app.id,
                live.len()
            )));
        }
    };
    let new_count = app.tasks.count_by_version(&new_version);
    let old_count = app.tasks.count_by_version(&old_version);
    let weights = compute_weight(new_count, old_count, req.value)?;

    gate::begin(app, Operation::UpdateWeights)?;
    app.tasks.set_weight(&new_version, weights.new_weight);
    app.tasks.set_weight(&old_version, weights.old_weight);
    if let Some(canary) = app.canary.as_mut() {
        canary.value = req.value;
    }
    gate::settle(app);

    info!(
        app = %app.id,
        value = req.value,
        new_weight = weights.new_weight,
        old_weight = weights.old_weight,
        "weights updated"
    );
    Ok(weights)
}

/// Apply the split for `fraction` between two version groups.
///
/// A group that ended up empty hands the full share to the other.
pub(crate) fn apply_split(
    app: &mut Application,
    new_version: &str,
    old_version: &str,
    fraction: f64,
) -> CanaryResult<Option<Weights>> {
    let new_count = app.tasks.count_by_version(new_version);
    let old_count = app.tasks.count_by_version(old_version);

    match (new_count, old_count) {
        (0, 0) => Ok(None),
        (0, _) => {
            app.tasks.set_weight(old_version, BASELINE_WEIGHT);
            Ok(None)
        }
        (_, 0) => {
            app.tasks.set_weight(new_version, BASELINE_WEIGHT);
            Ok(None)
        }
        (n, o) => {
            let weights = compute_weight(n, o, fraction)?;
            app.tasks.set_weight(new_version, weights.new_weight);
            app.tasks.set_weight(old_version, weights.old_weight);
            Ok(Some(weights))
        }
    }
}
