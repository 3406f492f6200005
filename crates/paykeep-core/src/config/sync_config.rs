use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Full-pull scheduling and the authoritative collection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Periodic sync interval while online, in seconds.
    pub interval_secs: u64,
    /// Non-forced syncs are skipped when the last one is younger than this.
    pub min_interval_secs: u64,
    pub payments_path: String,
    /// Archived payments, merged into the payments table. `None` disables it.
    pub archive_path: Option<String>,
    pub categories_path: String,
    pub user_path: String,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::DEFAULT_SYNC_INTERVAL_SECS,
            min_interval_secs: defaults::DEFAULT_MIN_SYNC_INTERVAL_SECS,
            payments_path: defaults::DEFAULT_PAYMENTS_PATH.to_string(),
            archive_path: Some(defaults::DEFAULT_ARCHIVE_PATH.to_string()),
            categories_path: defaults::DEFAULT_CATEGORIES_PATH.to_string(),
            user_path: defaults::DEFAULT_USER_PATH.to_string(),
        }
    }
}
