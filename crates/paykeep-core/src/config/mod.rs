//! Configuration loaded from TOML. Every section falls back to the values
//! in [`defaults`], so an empty document is a valid configuration.

pub mod defaults;
mod observability_config;
mod queue_config;
mod storage_config;
mod sync_config;
mod transport_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use observability_config::ObservabilityConfig;
pub use queue_config::QueueConfig;
pub use storage_config::StorageConfig;
pub use sync_config::SyncConfig;
pub use transport_config::TransportConfig;

use crate::errors::{PaykeepError, PaykeepResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaykeepConfig {
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub sync: SyncConfig,
    pub transport: TransportConfig,
    pub observability: ObservabilityConfig,
}

impl PaykeepConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(source: &str) -> PaykeepResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| PaykeepError::ConfigError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> PaykeepResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| PaykeepError::ConfigError {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&source)
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> PaykeepResult<()> {
        if self.queue.max_attempts == 0 {
            return Err(PaykeepError::ConfigError {
                reason: "queue.max_attempts must be at least 1".into(),
            });
        }
        if self.queue.backoff_base_ms > self.queue.backoff_max_ms {
            return Err(PaykeepError::ConfigError {
                reason: format!(
                    "queue.backoff_base_ms ({}) exceeds queue.backoff_max_ms ({})",
                    self.queue.backoff_base_ms, self.queue.backoff_max_ms
                ),
            });
        }
        if self.transport.base_url.trim().is_empty() {
            return Err(PaykeepError::ConfigError {
                reason: "transport.base_url must not be empty".into(),
            });
        }
        if self.sync.interval_secs == 0 {
            return Err(PaykeepError::ConfigError {
                reason: "sync.interval_secs must be positive".into(),
            });
        }
        Ok(())
    }
}
