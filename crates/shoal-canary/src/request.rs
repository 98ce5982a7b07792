//! Request bodies accepted by the controllers.

use serde::{Deserialize, Serialize};
use shoal_state::{OnFailure, VersionSpec};

/// Create an application running `instances` tasks of `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppRequest {
    pub version: VersionSpec,
    pub instances: u32,
}

/// Introduce a canary version next to the running one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryUpdateRequest {
    pub version: VersionSpec,
    /// Tasks of the new version; the same number of old tasks is retired.
    pub instances: u32,
    /// Traffic fraction for the new version, in `[0, 1]`.
    pub value: f64,
    #[serde(default)]
    pub on_failure: OnFailure,
    /// Seconds between automated steps. Recorded, not acted upon.
    #[serde(default)]
    pub delay: f64,
}

/// Shift traffic between the two live versions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightUpdateRequest {
    /// New traffic fraction for the newer version, in `[0, 1]`.
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canary_request_defaults() {
        let json = r#"{
            "version": { "name": "demo", "cpu": 0.01, "mem": 10 },
            "instances": 3,
            "value": 0.5
        }"#;
        let req: CanaryUpdateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.instances, 3);
        assert_eq!(req.on_failure, OnFailure::Continue);
        assert_eq!(req.delay, 0.0);
        assert_eq!(req.version.mem, 10.0);
    }

    #[test]
    fn on_failure_parses_snake_case() {
        let json = r#"{
            "version": { "name": "demo", "cpu": 0.01, "mem": 10 },
            "instances": 1,
            "value": 0.1,
            "on_failure": "rollback",
            "delay": 0.5
        }"#;
        let req: CanaryUpdateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.on_failure, OnFailure::Rollback);
        assert_eq!(req.delay, 0.5);
    }
}
