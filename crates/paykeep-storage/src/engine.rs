//! StorageEngine: owns the ConnectionPool, implements QueueStore + CacheStore,
//! runs migrations at open.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use paykeep_core::config::StorageConfig;
use paykeep_core::constants::SNAPSHOT_VERSION;
use paykeep_core::errors::{PaykeepError, PaykeepResult, StorageError};
use paykeep_core::models::{
    Category, OfflineSnapshot, Payment, PaymentFilter, QueueCounts, QueuedRequest,
    QueuedRequestPatch, UserProfile,
};
use paykeep_core::traits::{CacheStore, QueueStore};

use crate::migrations;
use crate::pool::{ConnectionPool, ReadPool, WriteConnection};
use crate::queries::{cache_ops, in_transaction, maintenance, metadata_ops, queue_ops};

/// The storage engine behind the queue and the read cache.
pub struct StorageEngine {
    pool: ConnectionPool,
}

impl StorageEngine {
    /// Open a file-backed engine with default settings.
    pub fn open(path: &Path) -> PaykeepResult<Self> {
        Self::open_with_config(path, &StorageConfig::default())
    }

    /// Open a file-backed engine: writer first (creating the file and
    /// running migrations), then the read pool.
    pub fn open_with_config(path: &Path, config: &StorageConfig) -> PaykeepResult<Self> {
        let mut writer = WriteConnection::open(path, config.busy_timeout_ms)?;
        let applied = writer.with_conn_exclusive(migrations::run_migrations)?;
        let readers = ReadPool::open(path, config.read_pool_size, config.busy_timeout_ms)?;
        tracing::info!(
            path = %path.display(),
            migrations_applied = applied,
            readers = readers.size(),
            "storage opened"
        );
        Ok(Self {
            pool: ConnectionPool::new(writer, Some(readers), Some(path.to_path_buf())),
        })
    }

    /// Open an in-memory engine (for testing). All reads go through the writer.
    pub fn open_in_memory() -> PaykeepResult<Self> {
        let mut writer = WriteConnection::open_in_memory()?;
        writer.with_conn_exclusive(migrations::run_migrations)?;
        Ok(Self {
            pool: ConnectionPool::new(writer, None, None),
        })
    }

    /// Get a reference to the connection pool (for advanced operations).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Execute a read-only query on the best available connection.
    /// File-backed: uses the read pool (no writer contention).
    /// In-memory: uses the writer.
    async fn with_reader<F, T>(&self, f: F) -> PaykeepResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> PaykeepResult<T>,
    {
        match &self.pool.readers {
            Some(readers) => readers.with_conn(f),
            None => self.pool.writer.with_conn(f).await,
        }
    }

    /// Run `PRAGMA integrity_check`; any finding is corruption.
    pub async fn verify_integrity(&self) -> PaykeepResult<()> {
        let problems = self
            .pool
            .writer
            .with_conn(maintenance::integrity_check)
            .await?;
        if problems.is_empty() {
            return Ok(());
        }
        tracing::error!(problems = problems.len(), "integrity check failed");
        Err(PaykeepError::StorageError(StorageError::CorruptionDetected {
            details: problems.join("; "),
        }))
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> PaykeepResult<()> {
        self.pool.writer.with_conn(maintenance::wal_checkpoint).await
    }

    pub async fn schema_version(&self) -> PaykeepResult<u32> {
        self.pool.writer.with_conn(migrations::schema_version).await
    }
}

#[async_trait]
impl QueueStore for StorageEngine {
    async fn enqueue(&self, request: &QueuedRequest) -> PaykeepResult<()> {
        self.pool
            .writer
            .with_conn(|conn| queue_ops::enqueue(conn, request))
            .await
    }

    async fn list_queued(&self) -> PaykeepResult<Vec<QueuedRequest>> {
        self.with_reader(queue_ops::list_queued).await
    }

    async fn get_queued(&self, id: &str) -> PaykeepResult<Option<QueuedRequest>> {
        self.with_reader(|conn| queue_ops::get_queued(conn, id)).await
    }

    async fn update_queued(
        &self,
        id: &str,
        patch: &QueuedRequestPatch,
        now: DateTime<Utc>,
    ) -> PaykeepResult<Option<QueuedRequest>> {
        self.pool
            .writer
            .with_conn(|conn| queue_ops::update_queued(conn, id, patch, now))
            .await
    }

    async fn delete_queued(&self, id: &str) -> PaykeepResult<bool> {
        self.pool
            .writer
            .with_conn(|conn| queue_ops::delete_queued(conn, id))
            .await
    }

    async fn clear_queue(&self) -> PaykeepResult<usize> {
        self.pool.writer.with_conn(queue_ops::clear_queue).await
    }

    async fn clear_failed(&self) -> PaykeepResult<usize> {
        self.pool.writer.with_conn(queue_ops::clear_failed).await
    }

    async fn try_reserve(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> PaykeepResult<bool> {
        self.pool
            .writer
            .with_conn(|conn| queue_ops::try_reserve(conn, id, token, now, ttl))
            .await
    }

    async fn release_reservation(&self, id: &str, token: &str) -> PaykeepResult<bool> {
        self.pool
            .writer
            .with_conn(|conn| queue_ops::release_reservation(conn, id, token))
            .await
    }

    async fn queue_counts(&self) -> PaykeepResult<QueueCounts> {
        self.with_reader(queue_ops::queue_counts).await
    }

    async fn next_available_at(&self) -> PaykeepResult<Option<DateTime<Utc>>> {
        self.with_reader(queue_ops::next_available_at).await
    }

    async fn rewrite_queued_urls(
        &self,
        from: &str,
        to: &str,
        now: DateTime<Utc>,
    ) -> PaykeepResult<usize> {
        self.pool
            .writer
            .with_conn(|conn| queue_ops::rewrite_queued_urls(conn, from, to, now))
            .await
    }
}

#[async_trait]
impl CacheStore for StorageEngine {
    async fn replace_payments(&self, payments: &[Payment]) -> PaykeepResult<()> {
        self.pool
            .writer
            .with_conn(|conn| {
                in_transaction(conn, "replace_payments", |tx| {
                    cache_ops::replace_payments(tx, payments)
                })
            })
            .await
    }

    async fn replace_categories(&self, categories: &[Category]) -> PaykeepResult<()> {
        self.pool
            .writer
            .with_conn(|conn| {
                in_transaction(conn, "replace_categories", |tx| {
                    cache_ops::replace_categories(tx, categories)
                })
            })
            .await
    }

    async fn replace_user(&self, user: Option<&UserProfile>) -> PaykeepResult<()> {
        self.pool
            .writer
            .with_conn(|conn| {
                in_transaction(conn, "replace_user", |tx| cache_ops::replace_user(tx, user))
            })
            .await
    }

    async fn replace_snapshot(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<()> {
        self.pool
            .writer
            .with_conn(|conn| {
                in_transaction(conn, "replace_snapshot", |tx| {
                    cache_ops::replace_payments(tx, &snapshot.payments)?;
                    cache_ops::replace_categories(tx, &snapshot.categories)?;
                    cache_ops::replace_user(tx, snapshot.user.as_ref())?;
                    metadata_ops::set_last_sync(tx, snapshot.last_sync)
                })
            })
            .await
    }

    async fn replace_snapshot_if_idle(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<bool> {
        self.pool
            .writer
            .with_conn(|conn| {
                in_transaction(conn, "replace_snapshot_if_idle", |tx| {
                    if queue_ops::queue_counts(tx)?.pending > 0 {
                        return Ok(false);
                    }
                    cache_ops::replace_payments(tx, &snapshot.payments)?;
                    cache_ops::replace_categories(tx, &snapshot.categories)?;
                    cache_ops::replace_user(tx, snapshot.user.as_ref())?;
                    metadata_ops::set_last_sync(tx, snapshot.last_sync)?;
                    Ok(true)
                })
            })
            .await
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> PaykeepResult<Vec<Payment>> {
        self.with_reader(|conn| cache_ops::list_payments(conn, filter))
            .await
    }

    async fn get_payment(&self, id: &str) -> PaykeepResult<Option<Payment>> {
        self.with_reader(|conn| cache_ops::get_payment(conn, id)).await
    }

    async fn list_categories(&self) -> PaykeepResult<Vec<Category>> {
        self.with_reader(cache_ops::list_categories).await
    }

    async fn get_user(&self) -> PaykeepResult<Option<UserProfile>> {
        self.with_reader(cache_ops::get_user).await
    }

    async fn last_sync(&self) -> PaykeepResult<Option<DateTime<Utc>>> {
        self.with_reader(metadata_ops::last_sync).await
    }

    async fn clear_cache(&self) -> PaykeepResult<()> {
        self.pool
            .writer
            .with_conn(|conn| {
                in_transaction(conn, "clear_cache", |tx| {
                    cache_ops::clear_cache_tables(tx)?;
                    metadata_ops::clear_metadata(tx)
                })
            })
            .await
    }

    async fn export_snapshot(&self) -> PaykeepResult<OfflineSnapshot> {
        // One read transaction so the export is a consistent point in time.
        self.with_reader(|conn| {
            in_transaction(conn, "export_snapshot", |tx| {
                Ok(OfflineSnapshot::new(
                    cache_ops::list_payments(tx, &PaymentFilter::default())?,
                    cache_ops::list_categories(tx)?,
                    cache_ops::get_user(tx)?,
                    metadata_ops::last_sync(tx)?,
                ))
            })
        })
        .await
    }

    async fn import_snapshot(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PaykeepError::StorageError(StorageError::MalformedRecord {
                details: format!(
                    "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                    snapshot.version
                ),
            }));
        }
        self.replace_snapshot(snapshot).await?;
        tracing::info!(
            payments = snapshot.payments.len(),
            categories = snapshot.categories.len(),
            "snapshot imported"
        );
        Ok(())
    }
}
