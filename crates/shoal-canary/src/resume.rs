//! Rebuild the dispatch of an operation interrupted by a restart.
//!
//! Snapshots are written before any work reaches the executor, so a
//! snapshot left `Busy` records exactly the population the interrupted
//! operation planned: the new tasks are registered and the tasks to
//! retire are still listed. Re-running that dispatch is safe because
//! launching a running task and retiring a gone one are both no-ops for
//! the executor.

use shoal_state::{Application, OpStatus, Operation, TaskId};
use tracing::debug;

use crate::dispatch::Dispatch;

/// The dispatch an application left `Busy` was waiting on.
///
/// Returns `None` for settled applications and for operations that carry
/// no executor work (`update_weights` completes before it is persisted).
pub fn resume(app: &Application) -> Option<Dispatch> {
    let OpStatus::Busy { operation } = app.op_status else {
        return None;
    };

    let dispatch = match operation {
        Operation::Create => {
            let version = app.versions.latest()?.clone();
            Dispatch {
                operation,
                launch: task_ids(app, &version.id),
                version: Some(version),
                retire: Vec::new(),
            }
        }
        Operation::CreateCanary => {
            let record = app.canary.as_ref()?;
            let version = app.versions.get(&record.new_version_id)?.clone();
            // Same selection the plan made: the first `instances` old tasks.
            let retire = app
                .tasks
                .tasks_by_version(&record.old_version_id)
                .iter()
                .take(record.instances as usize)
                .map(|t| t.id.clone())
                .collect();
            Dispatch {
                operation,
                launch: task_ids(app, &version.id),
                version: Some(version),
                retire,
            }
        }
        Operation::Remove => Dispatch {
            operation,
            version: None,
            launch: Vec::new(),
            retire: app.tasks.ids(),
        },
        Operation::UpdateWeights => return None,
    };

    debug!(
        app = %app.id,
        %operation,
        launch = dispatch.launch.len(),
        retire = dispatch.retire.len(),
        "interrupted operation rebuilt"
    );
    Some(dispatch)
}

fn task_ids(app: &Application, version_id: &str) -> Vec<TaskId> {
    app.tasks
        .tasks_by_version(version_id)
        .iter()
        .map(|t| t.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canary::{plan_canary, settle_canary};
    use crate::dispatch::BatchReport;
    use crate::lifecycle::{plan_create, plan_remove, settle_create};
    use crate::request::CanaryUpdateRequest;
    use crate::testing::{canaried_app, running_app, spec, weight_of};

    #[test]
    fn settled_application_has_nothing_to_resume() {
        assert!(resume(&running_app(3)).is_none());
        assert!(resume(&canaried_app().0).is_none());
    }

    #[test]
    fn interrupted_create_relaunches_at_baseline() {
        let mut app = Application::new("demo", 3);
        let planned = plan_create(&mut app, spec(5.0)).unwrap();

        let dispatch = resume(&app).unwrap();
        assert_eq!(dispatch, planned);

        settle_create(&mut app, &BatchReport::success(&dispatch)).unwrap();
        let v0 = app.versions.latest().unwrap().id.clone();
        assert_eq!(weight_of(&app, &v0), vec![100; 3]);
        assert_eq!(app.op_status, OpStatus::Noop);
    }

    #[test]
    fn interrupted_canary_retires_the_planned_tasks() {
        let mut app = running_app(5);
        let old = app.versions.latest().unwrap().id.clone();
        let req = CanaryUpdateRequest {
            version: spec(10.0),
            instances: 3,
            value: 0.5,
            on_failure: Default::default(),
            delay: 0.5,
        };
        let planned = plan_canary(&mut app, &req).unwrap();
        assert_eq!(app.tasks.len(), 8);

        let dispatch = resume(&app).unwrap();
        assert_eq!(dispatch, planned);

        let status = settle_canary(&mut app, &BatchReport::success(&dispatch)).unwrap();
        assert_eq!(status, OpStatus::CanaryUnfinished);
        assert_eq!(app.tasks.len(), 5);
        let new = app.versions.latest().unwrap().id.clone();
        assert_eq!(weight_of(&app, &new), vec![67; 3]);
        assert_eq!(weight_of(&app, &old), vec![100; 2]);
    }

    #[test]
    fn interrupted_remove_retires_everything() {
        let (mut app, _, _) = canaried_app();
        let planned = plan_remove(&mut app).unwrap();
        assert_eq!(resume(&app).unwrap(), planned);
    }

    #[test]
    fn canary_without_record_is_not_resumed() {
        let mut app = running_app(5);
        app.op_status = OpStatus::Busy {
            operation: Operation::CreateCanary,
        };
        assert!(resume(&app).is_none());
    }
}
