//! shoald.toml configuration.
//!
//! Every field is optional; command-line flags override the file.
//!
//! ```toml
//! [executor]
//! launch_latency_ms = 200
//! retire_latency_ms = 100
//!
//! [api]
//! remove_timeout_secs = 30
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shoal_scheduler::LocalExecutorConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub executor: ExecutorSection,
    pub api: ApiSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub launch_latency_ms: u64,
    pub retire_latency_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            launch_latency_ms: 200,
            retire_latency_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Removal timeout when the request does not pass `timeout_secs`.
    pub remove_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            remove_timeout_secs: 30,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn executor_config(&self) -> LocalExecutorConfig {
        LocalExecutorConfig {
            launch_latency: Duration::from_millis(self.executor.launch_latency_ms),
            retire_latency: Duration::from_millis(self.executor.retire_latency_ms),
        }
    }

    pub fn remove_timeout(&self) -> Duration {
        Duration::from_secs(self.api.remove_timeout_secs)
    }
}
