use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::PaykeepResult;
use crate::models::{QueueCounts, QueuedRequest, QueuedRequestPatch};

/// Durable FIFO of queued mutations.
///
/// Every method is one transaction. Operations on an id that no longer
/// exists report it through their return value instead of failing.
#[async_trait]
pub trait QueueStore: Send + Sync {
    // --- CRUD ---
    async fn enqueue(&self, request: &QueuedRequest) -> PaykeepResult<()>;
    /// All entries, oldest first.
    async fn list_queued(&self) -> PaykeepResult<Vec<QueuedRequest>>;
    async fn get_queued(&self, id: &str) -> PaykeepResult<Option<QueuedRequest>>;
    /// Merge `patch` and set `updated_at` to `now`. `None` when the entry is gone.
    async fn update_queued(
        &self,
        id: &str,
        patch: &QueuedRequestPatch,
        now: DateTime<Utc>,
    ) -> PaykeepResult<Option<QueuedRequest>>;
    async fn delete_queued(&self, id: &str) -> PaykeepResult<bool>;
    async fn clear_queue(&self) -> PaykeepResult<usize>;
    /// Delete every FAILED entry.
    async fn clear_failed(&self) -> PaykeepResult<usize>;

    // --- Leases ---
    /// Take the lease unless another holder's lease is still active.
    async fn try_reserve(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> PaykeepResult<bool>;
    /// Drop the lease if `token` still holds it.
    async fn release_reservation(&self, id: &str, token: &str) -> PaykeepResult<bool>;

    // --- Aggregation ---
    async fn queue_counts(&self) -> PaykeepResult<QueueCounts>;
    /// Earliest `available_at` among pending entries.
    async fn next_available_at(&self) -> PaykeepResult<Option<DateTime<Utc>>>;

    // --- Offline ids ---
    /// Replace path segment `from` with `to` in every queued URL.
    async fn rewrite_queued_urls(
        &self,
        from: &str,
        to: &str,
        now: DateTime<Utc>,
    ) -> PaykeepResult<usize>;
}
