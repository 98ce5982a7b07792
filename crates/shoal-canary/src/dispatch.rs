//! Work handed to the task executor, and what comes back.

use serde::{Deserialize, Serialize};
use shoal_state::{FailureReport, Operation, TaskId, Version, epoch_secs};

/// Launches and retirements an accepted operation needs carried out.
///
/// Retirements are issued before launches.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub operation: Operation,
    /// Version the `launch` tasks run, when anything is launched.
    pub version: Option<Version>,
    pub launch: Vec<TaskId>,
    pub retire: Vec<TaskId>,
}

impl Dispatch {
    pub fn is_empty(&self) -> bool {
        self.launch.is_empty() && self.retire.is_empty()
    }
}

/// A single task the executor could not launch or retire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub reason: String,
}

/// Executor-confirmed outcome of a [`Dispatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub launched: Vec<TaskId>,
    pub failed_launches: Vec<TaskFailure>,
    pub retired: Vec<TaskId>,
    pub failed_retires: Vec<TaskFailure>,
}

impl BatchReport {
    /// Report for a dispatch that fully succeeded.
    pub fn success(dispatch: &Dispatch) -> Self {
        Self {
            launched: dispatch.launch.clone(),
            retired: dispatch.retire.clone(),
            ..Default::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_launches.is_empty() || !self.failed_retires.is_empty()
    }

    /// Failure record for the application, if anything went wrong.
    pub fn failure(&self, operation: Operation) -> Option<FailureReport> {
        if !self.is_partial() {
            return None;
        }
        let errors = self
            .failed_launches
            .iter()
            .map(|f| format!("launch {}: {}", f.task_id, f.reason))
            .chain(
                self.failed_retires
                    .iter()
                    .map(|f| format!("retire {}: {}", f.task_id, f.reason)),
            )
            .collect();
        Some(FailureReport {
            operation,
            failed_launches: self.failed_launches.len() as u32,
            failed_retires: self.failed_retires.len() as u32,
            errors,
            at: epoch_secs(),
        })
    }

    pub(crate) fn failed_launch_ids(&self) -> Vec<TaskId> {
        self.failed_launches.iter().map(|f| f.task_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_report_has_no_failure() {
        let dispatch = Dispatch {
            operation: Operation::Remove,
            version: None,
            launch: vec![],
            retire: vec!["task_a".to_string()],
        };
        let report = BatchReport::success(&dispatch);
        assert_eq!(report.retired, vec!["task_a".to_string()]);
        assert!(report.failure(Operation::Remove).is_none());
    }

    #[test]
    fn partial_report_lists_every_error() {
        let report = BatchReport {
            failed_launches: vec![TaskFailure {
                task_id: "task_a".to_string(),
                reason: "no offers".to_string(),
            }],
            failed_retires: vec![TaskFailure {
                task_id: "task_b".to_string(),
                reason: "agent lost".to_string(),
            }],
            ..Default::default()
        };
        let failure = report.failure(Operation::CreateCanary).unwrap();
        assert_eq!(failure.failed_launches, 1);
        assert_eq!(failure.failed_retires, 1);
        assert_eq!(
            failure.errors,
            vec![
                "launch task_a: no offers".to_string(),
                "retire task_b: agent lost".to_string()
            ]
        );
    }
}
