//! Fixtures shared by the controller tests.

use std::collections::HashMap;

use shoal_state::{Application, VersionId, VersionSpec};

use crate::canary::{plan_canary, settle_canary};
use crate::dispatch::BatchReport;
use crate::lifecycle::{plan_create, settle_create};
use crate::request::CanaryUpdateRequest;

pub(crate) fn spec(mem: f64) -> VersionSpec {
    VersionSpec {
        name: "demo".to_string(),
        cpu: 0.01,
        mem,
        disk: 0.0,
        image: Some("nginx:1.27".to_string()),
        cmd: None,
        env: HashMap::new(),
        labels: HashMap::new(),
    }
}

/// A settled `Noop` application with `count` tasks of one version.
pub(crate) fn running_app(count: u32) -> Application {
    let mut app = Application::new("demo", count);
    let dispatch = plan_create(&mut app, spec(5.0)).unwrap();
    settle_create(&mut app, &BatchReport::success(&dispatch)).unwrap();
    app
}

/// Five tasks, three of them moved to a canary at a 0.5 split.
///
/// Returns the application with the new and old version ids.
pub(crate) fn canaried_app() -> (Application, VersionId, VersionId) {
    let mut app = running_app(5);
    let old = app.versions.latest().unwrap().id.clone();
    let req = CanaryUpdateRequest {
        version: spec(10.0),
        instances: 3,
        value: 0.5,
        on_failure: Default::default(),
        delay: 0.5,
    };
    let dispatch = plan_canary(&mut app, &req).unwrap();
    settle_canary(&mut app, &BatchReport::success(&dispatch)).unwrap();
    let new = app.versions.latest().unwrap().id.clone();
    (app, new, old)
}

/// Weights of every task of `version`, in task id order.
pub(crate) fn weight_of(app: &Application, version: &str) -> Vec<u32> {
    app.tasks
        .tasks_by_version(version)
        .iter()
        .map(|t| t.weight)
        .collect()
}
