//! Scheduler: hosts every application and serializes operations on each.
//!
//! The `Scheduler` owns the application arena. For each application it:
//! - Admits at most one operation at a time (the per-application op lock)
//! - Persists a snapshot to the state store before dispatching any work
//! - Hands launches and retirements to the [`TaskExecutor`]
//! - Settles the application when the executor reports back
//!
//! Structural operations (create, canary, remove) return as soon as the
//! work is dispatched. The op-lock guard moves into the spawned completion
//! task, so a second structural request on the same application fails
//! with `StateConflict` until the first has settled.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, oneshot};
use tracing::{debug, error, info, warn};

use shoal_canary::{
    BatchReport, CanaryResult, CanaryUpdateRequest, CreateAppRequest, Dispatch, TaskFailure,
    WeightUpdateRequest, Weights, canary, gate, lifecycle, weights,
};
use shoal_state::{
    AppId, AppSummary, Application, FailureReport, OpStatus, Operation, StateStore, Task, TaskId,
    Version, epoch_secs,
};

use crate::error::{SchedulerError, SchedulerResult};
use crate::executor::{TaskExecutor, TaskOutcome};

/// One application and the locks guarding it.
struct AppSlot {
    id: AppId,
    name: String,
    /// Held for the whole lifetime of an operation, including the
    /// executor round trip.
    op_lock: Arc<Mutex<()>>,
    app: RwLock<Application>,
    /// Set once the application has been deleted.
    removed: AtomicBool,
}

impl AppSlot {
    fn new(app: Application) -> Self {
        Self {
            id: app.id.clone(),
            name: app.name.clone(),
            op_lock: Arc::new(Mutex::new(())),
            app: RwLock::new(app),
            removed: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct Arena {
    by_id: HashMap<AppId, Arc<AppSlot>>,
    by_name: HashMap<String, AppId>,
}

impl Arena {
    fn insert(&mut self, slot: Arc<AppSlot>) {
        self.by_name.insert(slot.name.clone(), slot.id.clone());
        self.by_id.insert(slot.id.clone(), slot);
    }
}

/// How a dispatched operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Settled(OpStatus),
    Removed,
}

struct Inner {
    state: StateStore,
    executor: Arc<dyn TaskExecutor>,
    arena: RwLock<Arena>,
}

/// The application host. Cheap to clone; clones share the same arena.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(state: StateStore, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                executor,
                arena: RwLock::new(Arena::default()),
            }),
        }
    }

    /// Reload every application snapshot from the state store.
    ///
    /// A snapshot written while an operation was in flight still lists the
    /// work that operation planned. That work is dispatched again and the
    /// application settles as if it had never been interrupted. Operations
    /// that cannot be rebuilt are settled from the recorded population and
    /// flagged in `last_failure`.
    pub async fn restore(&self) -> SchedulerResult<usize> {
        let snapshots = self.inner.state.list_applications()?;
        let mut arena = self.inner.arena.write().await;
        let mut resumed = Vec::new();
        let mut restored = 0;

        for mut app in snapshots {
            if arena.by_id.contains_key(&app.id) {
                continue;
            }
            if let OpStatus::Busy { operation } = app.op_status {
                match shoal_canary::resume(&app) {
                    Some(dispatch) => {
                        warn!(
                            app = %app.id,
                            %operation,
                            launch = dispatch.launch.len(),
                            retire = dispatch.retire.len(),
                            "resuming operation interrupted by restart"
                        );
                        resumed.push((app.id.clone(), dispatch));
                    }
                    None => {
                        let status = gate::settle(&mut app);
                        app.last_failure = Some(FailureReport {
                            operation,
                            failed_launches: 0,
                            failed_retires: 0,
                            errors: vec!["interrupted before completion".to_string()],
                            at: epoch_secs(),
                        });
                        self.inner.state.put_application(&app)?;
                        warn!(
                            app = %app.id,
                            %operation,
                            %status,
                            "settled operation interrupted by restart"
                        );
                    }
                }
            }
            arena.insert(Arc::new(AppSlot::new(app)));
            restored += 1;
        }

        let slots: Vec<_> = resumed
            .into_iter()
            .filter_map(|(id, dispatch)| arena.by_id.get(&id).cloned().map(|s| (s, dispatch)))
            .collect();
        drop(arena);

        for (slot, dispatch) in slots {
            let guard = slot
                .op_lock
                .clone()
                .try_lock_owned()
                .map_err(|e| SchedulerError::Internal(e.to_string()))?;
            self.spawn_completion(slot, guard, dispatch);
        }

        info!(count = restored, "applications restored");
        Ok(restored)
    }

    // ── Structural operations ─────────────────────────────────────

    /// Create an application running `req.instances` tasks of `req.version`.
    ///
    /// Returns once the launch is dispatched; the application is
    /// `Busy { create }` until the executor reports back.
    pub async fn create_app(&self, req: CreateAppRequest) -> SchedulerResult<AppId> {
        let mut app = Application::new(&req.version.name, req.instances);
        let dispatch = lifecycle::plan_create(&mut app, req.version)?;

        let mut arena = self.inner.arena.write().await;
        if arena.by_name.contains_key(&app.name) {
            return Err(SchedulerError::StateConflict(format!(
                "application name '{}' is already in use",
                app.name
            )));
        }
        self.inner.state.put_application(&app)?;

        let id = app.id.clone();
        let slot = Arc::new(AppSlot::new(app));
        let guard = slot
            .op_lock
            .clone()
            .try_lock_owned()
            .map_err(|e| SchedulerError::Internal(e.to_string()))?;
        arena.insert(slot.clone());
        drop(arena);

        info!(app = %id, name = %slot.name, tasks = dispatch.launch.len(), "application create dispatched");
        self.spawn_completion(slot, guard, dispatch);
        Ok(id)
    }

    /// Start a canary on an application that runs a single version.
    pub async fn create_canary(&self, id: &str, req: CanaryUpdateRequest) -> SchedulerResult<()> {
        let slot = self.slot(id).await?;
        let guard = self.lock_op(&slot)?;
        let dispatch = self.mutate(&slot, |app| canary::plan_canary(app, &req)).await?;

        self.spawn_completion(slot, guard, dispatch);
        Ok(())
    }

    /// Rebalance traffic between the two live versions.
    ///
    /// Completes synchronously: no task is launched or retired.
    pub async fn update_weights(
        &self,
        id: &str,
        req: WeightUpdateRequest,
    ) -> SchedulerResult<Weights> {
        let slot = self.slot(id).await?;
        let _guard = self.lock_op(&slot)?;
        self.mutate(&slot, |app| weights::update_weights(app, &req))
            .await
    }

    /// Retire every task and delete the application.
    ///
    /// Waits up to `timeout` for the executor. On timeout the removal keeps
    /// running in the background. Removing an unknown application succeeds.
    pub async fn remove_app(&self, id: &str, timeout: Duration) -> SchedulerResult<()> {
        let slot = match self.slot(id).await {
            Ok(slot) => slot,
            Err(SchedulerError::NotFound(_)) => {
                debug!(app = %id, "remove of unknown application");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let guard = match self.lock_op(&slot) {
            Ok(guard) => guard,
            Err(SchedulerError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let dispatch = self.mutate(&slot, lifecycle::plan_remove).await?;
        info!(app = %id, tasks = dispatch.retire.len(), "application removal dispatched");

        let done = self.spawn_completion(slot.clone(), guard, dispatch);
        match tokio::time::timeout(timeout, done).await {
            Ok(Ok(Ok(Completion::Removed))) => Ok(()),
            Ok(Ok(Ok(Completion::Settled(status)))) => {
                let app = slot.app.read().await;
                let errors = app
                    .last_failure
                    .as_ref()
                    .map(|f| f.errors.join("; "))
                    .unwrap_or_default();
                Err(SchedulerError::PartialFailure(format!(
                    "application {id} is {status} with {} tasks still running: {errors}",
                    app.tasks.len()
                )))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(SchedulerError::Internal(format!(
                "removal of {id} ended without a result"
            ))),
            Err(_) => {
                warn!(app = %id, ?timeout, "removal still in progress");
                Err(SchedulerError::Timeout {
                    what: format!("removal of application {id}"),
                    elapsed: timeout,
                })
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────────

    pub async fn inspect(&self, id: &str) -> SchedulerResult<AppSummary> {
        let slot = self.slot(id).await?;
        let app = slot.app.read().await;
        Ok(app.summary())
    }

    /// Every application, oldest first.
    pub async fn list_apps(&self) -> Vec<AppSummary> {
        let slots: Vec<Arc<AppSlot>> = {
            let arena = self.inner.arena.read().await;
            arena.by_id.values().cloned().collect()
        };
        let mut apps = Vec::with_capacity(slots.len());
        for slot in slots {
            apps.push(slot.app.read().await.summary());
        }
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        apps
    }

    /// Versions of an application, newest first.
    pub async fn list_versions(&self, id: &str) -> SchedulerResult<Vec<Version>> {
        let slot = self.slot(id).await?;
        let app = slot.app.read().await;
        Ok(app.versions.list().to_vec())
    }

    pub async fn list_tasks(&self, id: &str) -> SchedulerResult<Vec<Task>> {
        let slot = self.slot(id).await?;
        let app = slot.app.read().await;
        Ok(app.tasks.list())
    }

    // ── Internals ─────────────────────────────────────────────────

    async fn slot(&self, id: &str) -> SchedulerResult<Arc<AppSlot>> {
        let arena = self.inner.arena.read().await;
        arena
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("application {id}")))
    }

    /// Take the op lock without waiting.
    fn lock_op(&self, slot: &AppSlot) -> SchedulerResult<OwnedMutexGuard<()>> {
        let guard = slot.op_lock.clone().try_lock_owned().map_err(|_| {
            SchedulerError::StateConflict(format!(
                "application {} has an operation in flight",
                slot.id
            ))
        })?;
        if slot.removed.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotFound(format!("application {}", slot.id)));
        }
        Ok(guard)
    }

    /// Apply `f` to a copy of the application, persist the copy, then
    /// publish it. A failed check or a failed write leaves the
    /// application untouched.
    async fn mutate<T>(
        &self,
        slot: &AppSlot,
        f: impl FnOnce(&mut Application) -> CanaryResult<T>,
    ) -> SchedulerResult<T> {
        let mut app = slot.app.write().await;
        let mut draft = app.clone();
        let out = f(&mut draft)?;
        self.inner.state.put_application(&draft)?;
        *app = draft;
        Ok(out)
    }

    fn spawn_completion(
        &self,
        slot: Arc<AppSlot>,
        guard: OwnedMutexGuard<()>,
        dispatch: Dispatch,
    ) -> oneshot::Receiver<SchedulerResult<Completion>> {
        let (tx, rx) = oneshot::channel();
        let this = self.clone();

        tokio::spawn(async move {
            let report = this.execute(&slot.id, &dispatch).await;
            let outcome = this.complete(&slot, &dispatch, &report).await;
            match &outcome {
                Ok(Completion::Settled(status)) => {
                    debug!(app = %slot.id, operation = %dispatch.operation, %status, "operation complete");
                }
                Ok(Completion::Removed) => info!(app = %slot.id, "application removed"),
                Err(e) => {
                    error!(app = %slot.id, operation = %dispatch.operation, error = %e, "failed to settle operation");
                }
            }
            drop(guard);
            // The requester may have stopped waiting.
            let _ = tx.send(outcome);
        });

        rx
    }

    /// Run a dispatch against the executor: retirements first, then launches.
    async fn execute(&self, app_id: &str, dispatch: &Dispatch) -> BatchReport {
        let mut report = BatchReport::default();

        if !dispatch.retire.is_empty() {
            let outcomes = self
                .inner
                .executor
                .retire(app_id, dispatch.retire.clone())
                .await;
            let (ok, failed) = fold_outcomes(&dispatch.retire, outcomes);
            report.retired = ok;
            report.failed_retires = failed;
        }

        if !dispatch.launch.is_empty() {
            match &dispatch.version {
                Some(version) => {
                    let outcomes = self
                        .inner
                        .executor
                        .launch(app_id, version, dispatch.launch.clone())
                        .await;
                    let (ok, failed) = fold_outcomes(&dispatch.launch, outcomes);
                    report.launched = ok;
                    report.failed_launches = failed;
                }
                None => {
                    report.failed_launches = dispatch
                        .launch
                        .iter()
                        .map(|id| TaskFailure {
                            task_id: id.clone(),
                            reason: "no version to launch".to_string(),
                        })
                        .collect();
                }
            }
        }

        report
    }

    /// Fold an executor report into the application and persist the result.
    async fn complete(
        &self,
        slot: &AppSlot,
        dispatch: &Dispatch,
        report: &BatchReport,
    ) -> SchedulerResult<Completion> {
        let mut app = slot.app.write().await;
        let outcome = match dispatch.operation {
            Operation::Create => lifecycle::settle_create(&mut app, report).map(Completion::Settled),
            Operation::CreateCanary => {
                canary::settle_canary(&mut app, report).map(Completion::Settled)
            }
            Operation::Remove => lifecycle::settle_remove(&mut app, report).map(|removed| {
                if removed {
                    Completion::Removed
                } else {
                    Completion::Settled(app.op_status)
                }
            }),
            Operation::UpdateWeights => Ok(Completion::Settled(gate::settle(&mut app))),
        };
        if app.op_status.is_busy() {
            gate::settle(&mut app);
        }

        if matches!(outcome, Ok(Completion::Removed)) {
            drop(app);
            self.forget(slot).await?;
            return Ok(Completion::Removed);
        }
        self.inner.state.put_application(&app)?;
        Ok(outcome?)
    }

    /// Drop a removed application from the arena and the state store.
    async fn forget(&self, slot: &AppSlot) -> SchedulerResult<()> {
        slot.removed.store(true, Ordering::SeqCst);
        {
            let mut arena = self.inner.arena.write().await;
            arena.by_id.remove(&slot.id);
            arena.by_name.remove(&slot.name);
        }
        match self.inner.state.take_application(&slot.id)? {
            Some(last) => debug!(app = %slot.id, status = %last.op_status, "snapshot dropped"),
            None => debug!(app = %slot.id, "no snapshot to drop"),
        }
        Ok(())
    }
}

/// Split executor outcomes into successes and failures. Tasks the executor
/// did not report on count as failed.
fn fold_outcomes(
    expected: &[TaskId],
    outcomes: Vec<TaskOutcome>,
) -> (Vec<TaskId>, Vec<TaskFailure>) {
    let mut reported: HashMap<TaskId, Result<(), String>> = outcomes
        .into_iter()
        .map(|o| (o.task_id, o.result))
        .collect();

    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for task_id in expected {
        match reported.remove(task_id) {
            Some(Ok(())) => ok.push(task_id.clone()),
            Some(Err(reason)) => failed.push(TaskFailure {
                task_id: task_id.clone(),
                reason,
            }),
            None => failed.push(TaskFailure {
                task_id: task_id.clone(),
                reason: "no outcome reported".to_string(),
            }),
        }
    }
    (ok, failed)
}
