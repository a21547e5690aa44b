//! grouplcm.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcmConfig {
    pub store: StoreConfig,
    pub controller: ControllerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the object database.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/grouplcm"),
        }
    }
}

impl StoreConfig {
    /// Path of the redb file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("grouplcm.redb")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers.
    pub workers: usize,
    /// First retry delay after a failed reconcile.
    pub backoff_base_ms: u64,
    /// Upper bound on the retry delay.
    pub backoff_max_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
        }
    }
}

impl ControllerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive string, overridden by `RUST_LOG`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,grouplcm=debug".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LcmConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LcmConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.controller.workers == 0 {
            anyhow::bail!("controller.workers must be at least 1");
        }
        if self.controller.backoff_base_ms > self.controller.backoff_max_ms {
            anyhow::bail!("controller.backoff_base_ms exceeds controller.backoff_max_ms");
        }
        Ok(())
    }
}
