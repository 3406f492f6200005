use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cache::{Category, Payment, UserProfile};
use crate::constants::SNAPSHOT_VERSION;

/// The cached collections served to the UI while offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfflineData {
    pub payments: Vec<Payment>,
    pub categories: Vec<Category>,
    pub user: Option<UserProfile>,
}

/// Versioned export of the whole read cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSnapshot {
    pub payments: Vec<Payment>,
    pub categories: Vec<Category>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_sync: Option<DateTime<Utc>>,
    pub version: u32,
}

impl OfflineSnapshot {
    pub fn new(
        payments: Vec<Payment>,
        categories: Vec<Category>,
        user: Option<UserProfile>,
        last_sync: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            payments,
            categories,
            user,
            last_sync,
            version: SNAPSHOT_VERSION,
        }
    }

    pub fn into_data(self) -> OfflineData {
        OfflineData {
            payments: self.payments,
            categories: self.categories,
            user: self.user,
        }
    }
}
