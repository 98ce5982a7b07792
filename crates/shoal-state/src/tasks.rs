//! TaskRegistry: task records for one application.
//!
//! Every task is bound to a single version id and carries the integer
//! weight the traffic layer reads. Weights are always applied per version
//! group, so tasks of one version never disagree.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::{Task, TaskId, VersionId, epoch_secs, new_id};

/// Mutable set of tasks keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `count` new tasks of `version_id` with weight 0.
    pub fn launch(&mut self, version_id: &str, count: u32) -> Vec<TaskId> {
        let now = epoch_secs();
        let ids: Vec<TaskId> = (0..count).map(|_| new_id("task")).collect();
        for id in &ids {
            self.tasks.insert(
                id.clone(),
                Task {
                    id: id.clone(),
                    version_id: version_id.to_string(),
                    weight: 0,
                    created_at: now,
                },
            );
        }
        debug!(version = %version_id, count, "tasks registered");
        ids
    }

    /// Remove the given tasks. Fails without mutating if any id is absent.
    pub fn retire(&mut self, ids: &[TaskId]) -> StateResult<()> {
        if let Some(missing) = ids.iter().find(|id| !self.tasks.contains_key(*id)) {
            return Err(StateError::NotFound(format!("task {missing}")));
        }
        for id in ids {
            self.tasks.remove(id);
        }
        debug!(count = ids.len(), "tasks retired");
        Ok(())
    }

    /// Apply `weight` to every task of `version_id`. Returns the number updated.
    pub fn set_weight(&mut self, version_id: &str, weight: u32) -> usize {
        let mut updated = 0;
        for task in self.tasks.values_mut().filter(|t| t.version_id == version_id) {
            task.weight = weight;
            updated += 1;
        }
        debug!(version = %version_id, weight, updated, "weight applied");
        updated
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks_by_version(&self, version_id: &str) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.version_id == version_id)
            .collect()
    }

    pub fn count_by_version(&self, version_id: &str) -> u32 {
        self.tasks
            .values()
            .filter(|t| t.version_id == version_id)
            .count() as u32
    }

    /// Live task count per version id.
    pub fn counts(&self) -> HashMap<VersionId, u32> {
        let mut counts = HashMap::new();
        for task in self.tasks.values() {
            *counts.entry(task.version_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// All tasks, ordered by id.
    pub fn list(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_starts_at_zero_weight() {
        let mut reg = TaskRegistry::new();
        let ids = reg.launch("ver_a", 3);

        assert_eq!(ids.len(), 3);
        assert_eq!(reg.len(), 3);
        assert!(reg.list().iter().all(|t| t.weight == 0 && t.version_id == "ver_a"));
    }

    #[test]
    fn retire_is_all_or_nothing() {
        let mut reg = TaskRegistry::new();
        let ids = reg.launch("ver_a", 2);

        let mut bogus = ids.clone();
        bogus.push("task_missing".to_string());
        assert!(matches!(reg.retire(&bogus), Err(StateError::NotFound(_))));
        assert_eq!(reg.len(), 2);

        reg.retire(&ids[..1]).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get(&ids[0]).is_none());
    }

    #[test]
    fn set_weight_touches_one_version_only() {
        let mut reg = TaskRegistry::new();
        reg.launch("ver_old", 2);
        reg.launch("ver_new", 3);

        assert_eq!(reg.set_weight("ver_new", 67), 3);
        assert_eq!(reg.set_weight("ver_old", 100), 2);

        assert!(reg.tasks_by_version("ver_new").iter().all(|t| t.weight == 67));
        assert!(reg.tasks_by_version("ver_old").iter().all(|t| t.weight == 100));
        assert_eq!(reg.set_weight("ver_gone", 5), 0);
    }

    #[test]
    fn counts_per_version() {
        let mut reg = TaskRegistry::new();
        reg.launch("ver_old", 2);
        reg.launch("ver_new", 3);

        let counts = reg.counts();
        assert_eq!(counts["ver_old"], 2);
        assert_eq!(counts["ver_new"], 3);
        assert_eq!(reg.count_by_version("ver_new"), 3);
        assert_eq!(reg.count_by_version("ver_none"), 0);
    }

    #[test]
    fn list_is_sorted_by_id() {
        let mut reg = TaskRegistry::new();
        reg.launch("ver_a", 4);
        let ids: Vec<_> = reg.list().into_iter().map(|t| t.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(reg.ids(), sorted);
    }
}
