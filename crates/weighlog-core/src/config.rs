//! Engine configuration, loadable from TOML.
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```toml
//! # weighlog.toml
//! log_dir = "Logs"
//! records_file = "experiment_records.csv"
//! counter_file = "last_exp.txt"
//! default_interval_ms = 2000
//! time_scale = "seconds"
//! idle_preview = true
//! idle_poll_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::counter::DailyCounterStore;
use crate::error::ConfigError;
use crate::scale::TimeScale;
use crate::telemetry_log::TelemetryLog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for the durable log, counter file and experiment segments.
    pub log_dir: PathBuf,
    pub records_file: String,
    pub counter_file: String,
    /// Sampling interval used until the first start or interval change.
    pub default_interval_ms: u64,
    pub time_scale: TimeScale,
    /// Refresh the latest reading from the source while idle.
    pub idle_preview: bool,
    /// Longest the engine waits on its command channel while idle.
    pub idle_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("Logs"),
            records_file: "experiment_records.csv".to_string(),
            counter_file: "last_exp.txt".to_string(),
            default_interval_ms: 2_000,
            time_scale: TimeScale::Seconds,
            idle_preview: true,
            idle_poll_ms: 1_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.default_interval_ms == 0 {
            return Err(ConfigError::NonPositiveInterval { value: 0.0 });
        }
        Ok(config)
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms.max(1))
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }

    pub fn telemetry_log(&self) -> TelemetryLog {
        TelemetryLog::new(&self.log_dir, &self.records_file)
    }

    pub fn counter_store(&self) -> DailyCounterStore {
        DailyCounterStore::new(&self.log_dir, &self.counter_file)
    }
}
