use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL every relative request path is joined onto.
    pub base_url: String,
    /// Per-request timeout. Replays inherit it.
    pub timeout_secs: u64,
    /// Path probed to confirm connectivity. `None` disables probing.
    pub probe_path: Option<String>,
    /// Accept gzip-compressed responses.
    pub gzip: bool,
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::DEFAULT_BASE_URL.to_string(),
            timeout_secs: defaults::DEFAULT_TIMEOUT_SECS,
            probe_path: None,
            gzip: defaults::DEFAULT_GZIP,
        }
    }
}
