use std::fmt;

use serde::{Deserialize, Serialize};

/// Connectivity as observed by the client.
///
/// `Syncing` is a refinement of online: the platform reports connectivity
/// and a replay sweep or full pull is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
    Syncing,
}

impl ConnectionStatus {
    pub fn is_online(self) -> bool {
        !matches!(self, ConnectionStatus::Offline)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Offline => "offline",
            ConnectionStatus::Syncing => "syncing",
        };
        f.write_str(s)
    }
}
