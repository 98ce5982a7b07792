//! Task executor: the boundary to whatever physically runs tasks.
//!
//! The scheduler hands every accepted structural operation to a
//! [`TaskExecutor`] and settles the application once the returned futures
//! resolve. Results are reported per task so partial failures can be
//! folded back into the application.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use shoal_state::{AppId, TaskId, Version, VersionId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Boxed future returned by executor calls.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Outcome of launching or retiring one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub result: Result<(), String>,
}

impl TaskOutcome {
    pub fn ok(task_id: TaskId) -> Self {
        Self {
            task_id,
            result: Ok(()),
        }
    }

    pub fn failed(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            result: Err(reason.into()),
        }
    }
}

/// Launches and retires tasks on behalf of the scheduler.
pub trait TaskExecutor: Send + Sync + 'static {
    /// Start `tasks` running `version`. Resolves once every task has
    /// either started or failed.
    fn launch(&self, app_id: &str, version: &Version, tasks: Vec<TaskId>)
    -> BoxFuture<Vec<TaskOutcome>>;

    /// Stop `tasks`. Resolves once every task is gone or failed to stop.
    fn retire(&self, app_id: &str, tasks: Vec<TaskId>) -> BoxFuture<Vec<TaskOutcome>>;
}

/// Timing of the in-process executor.
#[derive(Debug, Clone)]
pub struct LocalExecutorConfig {
    /// Simulated time for a batch of tasks to start.
    pub launch_latency: Duration,
    /// Simulated time for a batch of tasks to stop.
    pub retire_latency: Duration,
}

impl Default for LocalExecutorConfig {
    fn default() -> Self {
        Self {
            launch_latency: Duration::from_millis(200),
            retire_latency: Duration::from_millis(100),
        }
    }
}

/// A task the local executor considers running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningTask {
    pub app_id: AppId,
    pub version_id: VersionId,
}

/// In-process executor used by standalone mode and tests.
///
/// Keeps a table of running tasks and can be told to fail the next N
/// launches or retirements.
#[derive(Clone, Default)]
pub struct LocalExecutor {
    config: LocalExecutorConfig,
    running: Arc<RwLock<HashMap<TaskId, RunningTask>>>,
    fail_launches: Arc<AtomicU32>,
    fail_retires: Arc<AtomicU32>,
}

impl LocalExecutor {
    pub fn new(config: LocalExecutorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Executor with no simulated latency.
    pub fn instant() -> Self {
        Self::new(LocalExecutorConfig {
            launch_latency: Duration::ZERO,
            retire_latency: Duration::ZERO,
        })
    }

    /// Fail the next `n` task launches.
    pub fn fail_next_launches(&self, n: u32) {
        self.fail_launches.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` task retirements.
    pub fn fail_next_retires(&self, n: u32) {
        self.fail_retires.store(n, Ordering::SeqCst);
    }

    /// Number of tasks currently running for an application.
    pub async fn running_count(&self, app_id: &str) -> usize {
        let running = self.running.read().await;
        running.values().filter(|t| t.app_id == app_id).count()
    }

    pub async fn is_running(&self, task_id: &str) -> bool {
        self.running.read().await.contains_key(task_id)
    }
}

/// Take one unit from an injected-failure budget.
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl TaskExecutor for LocalExecutor {
    fn launch(
        &self,
        app_id: &str,
        version: &Version,
        tasks: Vec<TaskId>,
    ) -> BoxFuture<Vec<TaskOutcome>> {
        let this = self.clone();
        let app_id = app_id.to_string();
        let version_id = version.id.clone();

        Box::pin(async move {
            if !this.config.launch_latency.is_zero() {
                tokio::time::sleep(this.config.launch_latency).await;
            }

            let mut running = this.running.write().await;
            let mut outcomes = Vec::with_capacity(tasks.len());
            for task_id in tasks {
                if take_failure(&this.fail_launches) {
                    warn!(app = %app_id, task = %task_id, "injected launch failure");
                    outcomes.push(TaskOutcome::failed(task_id, "launch failed"));
                    continue;
                }
                running.insert(
                    task_id.clone(),
                    RunningTask {
                        app_id: app_id.clone(),
                        version_id: version_id.clone(),
                    },
                );
                outcomes.push(TaskOutcome::ok(task_id));
            }
            debug!(app = %app_id, version = %version_id, count = outcomes.len(), "launch batch done");
            outcomes
        })
    }

    fn retire(&self, app_id: &str, tasks: Vec<TaskId>) -> BoxFuture<Vec<TaskOutcome>> {
        let this = self.clone();
        let app_id = app_id.to_string();

        Box::pin(async move {
            if !this.config.retire_latency.is_zero() {
                tokio::time::sleep(this.config.retire_latency).await;
            }

            let mut running = this.running.write().await;
            let mut outcomes = Vec::with_capacity(tasks.len());
            for task_id in tasks {
                if take_failure(&this.fail_retires) {
                    warn!(app = %app_id, task = %task_id, "injected retire failure");
                    outcomes.push(TaskOutcome::failed(task_id, "retire failed"));
                    continue;
                }
                // Retiring a task that never started is not an error.
                running.remove(&task_id);
                outcomes.push(TaskOutcome::ok(task_id));
            }
            debug!(app = %app_id, count = outcomes.len(), "retire batch done");
            outcomes
        })
    }
}
