//! Domain types for the Shoal application model.
//!
//! An [`Application`] owns its versions, its tasks and the op status that
//! gates which operations are currently legal. All types serialize to
//! JSON, both for API responses and for redb snapshots.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};
use crate::tasks::TaskRegistry;
use crate::versions::VersionStore;

/// Unique identifier for an application (`app_<ulid>`).
pub type AppId = String;

/// Unique identifier for a version (`ver_<ulid>`).
pub type VersionId = String;

/// Unique identifier for a task (`task_<ulid>`).
pub type TaskId = String;

/// Weight carried by a task that receives a full, undivided traffic share.
pub const BASELINE_WEIGHT: u32 = 100;

/// Process-wide source of ids. Ids handed out within the same millisecond
/// still sort in creation order.
static ID_GENERATOR: LazyLock<Mutex<ulid::Generator>> =
    LazyLock::new(|| Mutex::new(ulid::Generator::new()));

/// Generate a fresh prefixed identifier.
///
/// Ids sort by creation time, so the lowest task id of a version is its
/// oldest task.
pub fn new_id(prefix: &str) -> String {
    let mut generator = ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    // Overflow needs 2^80 ids in one millisecond; fall back to a random one.
    let id = generator.generate().unwrap_or_else(|_| ulid::Ulid::new());
    format!("{prefix}_{id}")
}

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Version ───────────────────────────────────────────────────────

/// Resource requirements and runtime parameters of a version.
///
/// Opaque to the weight engine; only validated at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionSpec {
    /// Instance name shared by every task of the application.
    pub name: String,
    /// CPU shares per task.
    pub cpu: f64,
    /// Memory per task, in MiB.
    pub mem: f64,
    #[serde(default)]
    pub disk: f64,
    /// Container image, if the task runs in a container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl VersionSpec {
    /// Reject specs the executor could never run.
    pub fn validate(&self) -> StateResult<()> {
        if self.name.trim().is_empty() {
            return Err(StateError::InvalidSpec("name must not be empty".to_string()));
        }
        if self.cpu.is_nan() || self.cpu <= 0.0 {
            return Err(StateError::InvalidSpec(format!(
                "cpu must be positive, got {}",
                self.cpu
            )));
        }
        if self.mem.is_nan() || self.mem <= 0.0 {
            return Err(StateError::InvalidSpec(format!(
                "mem must be positive, got {}",
                self.mem
            )));
        }
        if self.disk < 0.0 {
            return Err(StateError::InvalidSpec(format!(
                "disk must not be negative, got {}",
                self.disk
            )));
        }
        Ok(())
    }
}

/// An immutable, appended deployment recipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Version {
    pub id: VersionId,
    #[serde(flatten)]
    pub spec: VersionSpec,
    /// Unix timestamp (seconds) when this version was appended.
    pub created_at: u64,
}

// ── Task ──────────────────────────────────────────────────────────

/// One running instance of a version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub version_id: VersionId,
    /// Traffic weight read by the load-balancing layer. 0 = no traffic.
    pub weight: u32,
    pub created_at: u64,
}

// ── Op status ─────────────────────────────────────────────────────

/// Structural or weight operation currently being carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    CreateCanary,
    UpdateWeights,
    Remove,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::CreateCanary => f.write_str("create_canary"),
            Self::UpdateWeights => f.write_str("update_weights"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// Per-application state gating which operations are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Settled; a single version owns every task.
    Noop,
    /// Settled; exactly two versions own live tasks.
    CanaryUnfinished,
    /// An operation has been dispatched and has not completed yet.
    Busy { operation: Operation },
}

impl OpStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    pub fn is_settled(&self) -> bool {
        !self.is_busy()
    }
}

impl std::fmt::Display for OpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Noop => f.write_str("noop"),
            Self::CanaryUnfinished => f.write_str("canary_unfinished"),
            Self::Busy { operation } => write!(f, "busy({operation})"),
        }
    }
}

// ── Canary bookkeeping ────────────────────────────────────────────

/// Caller preference when part of a canary launch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Keep whatever population came up and let the caller correct it.
    #[default]
    Continue,
    Pause,
    Rollback,
}

/// The canary pair currently in flight for an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanaryRecord {
    pub new_version_id: VersionId,
    pub old_version_id: VersionId,
    /// Tasks of the new version requested at creation.
    pub instances: u32,
    /// Latest requested traffic fraction for the new version.
    pub value: f64,
    pub on_failure: OnFailure,
    /// Step interval for automated rollouts, in seconds. Recorded only.
    pub delay_secs: f64,
}

/// Discrepancy left behind by a partially failed operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReport {
    pub operation: Operation,
    pub failed_launches: u32,
    pub failed_retires: u32,
    pub errors: Vec<String>,
    pub at: u64,
}

// ── Application ───────────────────────────────────────────────────

/// One managed workload: the unit of API operations and mutual exclusion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: AppId,
    pub name: String,
    pub op_status: OpStatus,
    /// Total task count; fixed at creation.
    pub desired_task_count: u32,
    pub versions: VersionStore,
    pub tasks: TaskRegistry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanaryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureReport>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Application {
    /// A fresh application with no versions or tasks, in `Noop`.
    pub fn new(name: &str, desired_task_count: u32) -> Self {
        let now = epoch_secs();
        Self {
            id: new_id("app"),
            name: name.to_string(),
            op_status: OpStatus::Noop,
            desired_task_count,
            versions: VersionStore::new(),
            tasks: TaskRegistry::new(),
            canary: None,
            last_failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Versions owning at least one live task, newest first.
    pub fn live_versions(&self) -> Vec<&Version> {
        self.versions
            .list()
            .iter()
            .filter(|v| self.tasks.count_by_version(&v.id) > 0)
            .collect()
    }

    /// The settled status implied by the current task population.
    pub fn population_status(&self) -> OpStatus {
        if self.live_versions().len() >= 2 {
            OpStatus::CanaryUnfinished
        } else {
            OpStatus::Noop
        }
    }

    /// Whether the task population reconciles with the declared total.
    pub fn is_reconciled(&self) -> bool {
        self.tasks.len() as u32 == self.desired_task_count
    }

    pub fn touch(&mut self) {
        self.updated_at = epoch_secs();
    }

    /// Observable view returned by inspect.
    pub fn summary(&self) -> AppSummary {
        AppSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            op_status: self.op_status,
            desired_task_count: self.desired_task_count,
            task_count: self.tasks.len() as u32,
            version_count: self.versions.len() as u32,
            versions: self.versions.list().to_vec(),
            canary: self.canary.clone(),
            last_failure: self.last_failure.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSummary {
    pub id: AppId,
    pub name: String,
    pub op_status: OpStatus,
    pub desired_task_count: u32,
    pub task_count: u32,
    pub version_count: u32,
    pub versions: Vec<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanaryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureReport>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[cfg(test)]
pub(crate) fn test_spec(name: &str, mem: f64) -> VersionSpec {
    VersionSpec {
        name: name.to_string(),
        cpu: 0.01,
        mem,
        disk: 0.0,
        image: Some("nginx:1.27".to_string()),
        cmd: None,
        env: HashMap::new(),
        labels: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_in_creation_order() {
        let ids: Vec<String> = (0..1000).map(|_| new_id("task")).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(ids.iter().all(|id| id.starts_with("task_")));
    }

    #[test]
    fn spec_validation_rejects_bad_resources() {
        assert!(test_spec("demo", 5.0).validate().is_ok());
        assert!(test_spec("", 5.0).validate().is_err());
        assert!(test_spec("demo", 0.0).validate().is_err());

        let mut spec = test_spec("demo", 5.0);
        spec.cpu = f64::NAN;
        assert!(matches!(spec.validate(), Err(StateError::InvalidSpec(_))));
    }

    #[test]
    fn population_status_follows_live_versions() {
        let mut app = Application::new("demo", 5);
        let v0 = app.versions.append(test_spec("demo", 5.0));
        app.tasks.launch(&v0, 5);
        assert_eq!(app.population_status(), OpStatus::Noop);

        let v1 = app.versions.append(test_spec("demo", 10.0));
        // A version without tasks does not count.
        assert_eq!(app.population_status(), OpStatus::Noop);

        app.tasks.launch(&v1, 1);
        assert_eq!(app.population_status(), OpStatus::CanaryUnfinished);

        let live: Vec<_> = app.live_versions().iter().map(|v| v.id.clone()).collect();
        assert_eq!(live, vec![v1, v0]);
    }

    #[test]
    fn op_status_serializes_snake_case() {
        let json = serde_json::to_string(&OpStatus::CanaryUnfinished).unwrap();
        assert_eq!(json, "\"canary_unfinished\"");

        let busy = OpStatus::Busy {
            operation: Operation::CreateCanary,
        };
        let json = serde_json::to_string(&busy).unwrap();
        assert_eq!(json, r#"{"busy":{"operation":"create_canary"}}"#);
        assert_eq!(busy.to_string(), "busy(create_canary)");
    }

    #[test]
    fn summary_reports_counts() {
        let mut app = Application::new("demo", 3);
        let v0 = app.versions.append(test_spec("demo", 5.0));
        app.tasks.launch(&v0, 3);

        let summary = app.summary();
        assert_eq!(summary.name, "demo");
        assert_eq!(summary.task_count, 3);
        assert_eq!(summary.version_count, 1);
        assert!(app.is_reconciled());
    }
}
