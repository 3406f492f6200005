use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::PaykeepResult;
use crate::models::{Category, OfflineSnapshot, Payment, PaymentFilter, UserProfile};

/// Read cache of server collections. Each `replace_*` clears and refills
/// its table(s) in one transaction, so readers see either the old or the
/// new contents.
#[async_trait]
pub trait CacheStore: Send + Sync {
    // --- Replacement ---
    async fn replace_payments(&self, payments: &[Payment]) -> PaykeepResult<()>;
    async fn replace_categories(&self, categories: &[Category]) -> PaykeepResult<()>;
    async fn replace_user(&self, user: Option<&UserProfile>) -> PaykeepResult<()>;
    /// All cache tables plus `lastSync` together.
    async fn replace_snapshot(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<()>;
    /// `replace_snapshot`, unless a queued mutation is pending. The check
    /// and the write share one transaction. `Ok(false)` leaves the cache
    /// untouched.
    async fn replace_snapshot_if_idle(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<bool>;

    // --- Reads ---
    async fn list_payments(&self, filter: &PaymentFilter) -> PaykeepResult<Vec<Payment>>;
    async fn get_payment(&self, id: &str) -> PaykeepResult<Option<Payment>>;
    async fn list_categories(&self) -> PaykeepResult<Vec<Category>>;
    async fn get_user(&self) -> PaykeepResult<Option<UserProfile>>;
    async fn last_sync(&self) -> PaykeepResult<Option<DateTime<Utc>>>;

    // --- Maintenance ---
    /// Empty every cache table and the sync metadata.
    async fn clear_cache(&self) -> PaykeepResult<()>;
    async fn export_snapshot(&self) -> PaykeepResult<OfflineSnapshot>;
    /// Validate the version, then replace everything with `snapshot`.
    async fn import_snapshot(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<()>;
}
