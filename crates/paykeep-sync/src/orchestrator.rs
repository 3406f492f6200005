//! Full authoritative pull that refreshes the read cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use paykeep_core::config::SyncConfig;
use paykeep_core::errors::{PaykeepError, PaykeepResult};
use paykeep_core::models::{Category, OfflineSnapshot, Payment, UserProfile};
use paykeep_core::traits::{CacheStore, Clock, QueueStore};
use paykeep_observability::sync_span;
use paykeep_observability::tracing_setup::events;

use crate::connectivity::ConnectivityMonitor;
use crate::events::{EventBus, SyncEvent};
use crate::interceptor::OfflineAwareClient;
use crate::processor::{DrainReport, QueueProcessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncSkipReason {
    Offline,
    InProgress,
    /// Queued mutations must reach the server before its state is pulled.
    PendingMutations,
    /// The last sync is younger than `min_interval` and the call was not forced.
    Throttled,
}

impl SyncSkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncSkipReason::Offline => "offline",
            SyncSkipReason::InProgress => "in_progress",
            SyncSkipReason::PendingMutations => "pending_mutations",
            SyncSkipReason::Throttled => "throttled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcomeStatus {
    Completed,
    /// Some collections were refreshed; `failed` names the others.
    Partial { failed: Vec<String> },
    Skipped { reason: SyncSkipReason },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub status: SyncOutcomeStatus,
    /// Rows written per collection. Zero for collections not refreshed.
    pub payments: usize,
    pub categories: usize,
    pub user: bool,
    /// The new `lastSync`, set only when every pull succeeded.
    pub synced_at: Option<DateTime<Utc>>,
    /// The sweep run ahead of the pull, if the guards got that far.
    pub drain: Option<DrainReport>,
}

impl SyncOutcome {
    fn skipped(reason: SyncSkipReason, drain: Option<DrainReport>) -> Self {
        events::sync_skipped(reason.as_str());
        Self {
            status: SyncOutcomeStatus::Skipped { reason },
            payments: 0,
            categories: 0,
            user: false,
            synced_at: None,
            drain,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SyncOutcomeStatus::Completed
    }
}

/// Clears the in-progress flag when the sync ends, however it ends.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    client: Arc<OfflineAwareClient>,
    processor: Arc<QueueProcessor>,
    queue: Arc<dyn QueueStore>,
    cache: Arc<dyn CacheStore>,
    monitor: Arc<ConnectivityMonitor>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    in_progress: AtomicBool,
}

impl SyncOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<OfflineAwareClient>,
        processor: Arc<QueueProcessor>,
        queue: Arc<dyn QueueStore>,
        cache: Arc<dyn CacheStore>,
        monitor: Arc<ConnectivityMonitor>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            processor,
            queue,
            cache,
            monitor,
            events,
            clock,
            config,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Pull payments (active plus archive), categories and the user
    /// profile, then replace the cache.
    ///
    /// Skips when offline, when another sync runs, when mutations are
    /// still pending after draining the queue, or (unless `force`) when
    /// the last sync is younger than `min_interval`. A mutation queued
    /// while the pull runs also turns the sync into a skip, leaving the
    /// cache as it was.
    pub async fn sync_all(&self, force: bool) -> PaykeepResult<SyncOutcome> {
        self.run(force).instrument(sync_span!(force)).await
    }

    async fn run(&self, force: bool) -> PaykeepResult<SyncOutcome> {
        if !self.monitor.is_online() {
            return Ok(SyncOutcome::skipped(SyncSkipReason::Offline, None));
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(SyncOutcome::skipped(SyncSkipReason::InProgress, None));
        }
        let _in_progress = InProgress(&self.in_progress);

        let drain = self.processor.drain().await;
        if self.queue.queue_counts().await?.pending > 0 {
            return Ok(SyncOutcome::skipped(
                SyncSkipReason::PendingMutations,
                Some(drain),
            ));
        }

        let now = self.clock.now();
        if !force {
            if let Some(last) = self.cache.last_sync().await? {
                let age = now.signed_duration_since(last).to_std().unwrap_or_default();
                if age < self.config.min_interval() {
                    return Ok(SyncOutcome::skipped(SyncSkipReason::Throttled, Some(drain)));
                }
            }
        }

        let _syncing = self.monitor.begin_syncing();
        let started = Instant::now();
        self.events.emit(SyncEvent::SyncStarted);
        self.progress(10, "Syncing payments...");

        let (payments, categories, user) = tokio::join!(
            self.pull_payments(),
            self.client.get_json::<Vec<Category>>(&self.config.categories_path),
            self.client.get_json::<Option<UserProfile>>(&self.config.user_path),
        );
        self.progress(80, "Finalizing sync...");

        let mut outcome = SyncOutcome {
            status: SyncOutcomeStatus::Completed,
            payments: 0,
            categories: 0,
            user: false,
            synced_at: None,
            drain: Some(drain),
        };

        let result = match (payments, categories, user) {
            (Ok(payments), Ok(categories), Ok(user)) => {
                outcome.payments = payments.len();
                outcome.categories = categories.len();
                outcome.user = user.is_some();
                let snapshot = OfflineSnapshot::new(payments, categories, user, Some(now));
                match self.cache.replace_snapshot_if_idle(&snapshot).await {
                    Ok(true) => {
                        outcome.synced_at = Some(now);
                        Ok(())
                    }
                    Ok(false) => return Ok(self.postponed(outcome.drain)),
                    Err(e) => Err(e),
                }
            }
            (payments, categories, user) => match self.queue.queue_counts().await {
                Ok(counts) if counts.pending > 0 => return Ok(self.postponed(outcome.drain)),
                Ok(_) => {
                    self.apply_partial(&mut outcome, payments, categories, user)
                        .await
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            let message = e.to_string();
            events::sync_failed(&message);
            self.events.emit(SyncEvent::SyncFailed { message });
            return Err(e);
        }

        match &outcome.status {
            SyncOutcomeStatus::Completed => {
                self.progress(100, "Sync completed");
                self.events.emit(SyncEvent::SyncCompleted { timestamp: now });
                events::sync_completed(
                    outcome.payments,
                    outcome.categories,
                    started.elapsed().as_millis() as u64,
                );
            }
            SyncOutcomeStatus::Partial { failed } => {
                let names: Vec<&str> = failed.iter().map(String::as_str).collect();
                events::sync_partial(&names);
                self.events.emit(SyncEvent::SyncFailed {
                    message: format!("Some sync operations failed: {}", failed.join(", ")),
                });
            }
            SyncOutcomeStatus::Skipped { .. } => {}
        }
        Ok(outcome)
    }

    /// A mutation was queued while the pull ran. The pulled data predates
    /// it, so the cache keeps its current contents.
    fn postponed(&self, drain: Option<DrainReport>) -> SyncOutcome {
        tracing::info!("mutations queued during the pull, cache left unchanged");
        self.events.emit(SyncEvent::SyncFailed {
            message: "Sync postponed: changes were queued while syncing".to_string(),
        });
        SyncOutcome::skipped(SyncSkipReason::PendingMutations, drain)
    }

    /// Store what did arrive. Fails outright when nothing did.
    async fn apply_partial(
        &self,
        outcome: &mut SyncOutcome,
        payments: PaykeepResult<Vec<Payment>>,
        categories: PaykeepResult<Vec<Category>>,
        user: PaykeepResult<Option<UserProfile>>,
    ) -> PaykeepResult<()> {
        let mut failed = Vec::new();
        let mut reasons = Vec::new();

        match payments {
            Ok(payments) => {
                self.cache.replace_payments(&payments).await?;
                outcome.payments = payments.len();
            }
            Err(e) => {
                failed.push("payments".to_string());
                reasons.push(format!("payments: {e}"));
            }
        }
        match categories {
            Ok(categories) => {
                self.cache.replace_categories(&categories).await?;
                outcome.categories = categories.len();
            }
            Err(e) => {
                failed.push("categories".to_string());
                reasons.push(format!("categories: {e}"));
            }
        }
        match user {
            Ok(user) => {
                self.cache.replace_user(user.as_ref()).await?;
                outcome.user = user.is_some();
            }
            Err(e) => {
                failed.push("user".to_string());
                reasons.push(format!("user: {e}"));
            }
        }

        if failed.len() == 3 {
            return Err(PaykeepError::SyncFailed {
                reason: reasons.join("; "),
            });
        }
        for reason in &reasons {
            tracing::warn!(reason = %reason, "collection not refreshed");
        }
        outcome.status = SyncOutcomeStatus::Partial { failed };
        Ok(())
    }

    async fn pull_payments(&self) -> PaykeepResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.client.get_json(&self.config.payments_path).await?;
        let active = payments.len();
        if let Some(archive_path) = &self.config.archive_path {
            let archived: Vec<Payment> = self.client.get_json(archive_path).await?;
            payments.extend(archived);
        }
        tracing::debug!(
            total = payments.len(),
            active = active,
            archived = payments.len() - active,
            "payments pulled"
        );
        Ok(payments)
    }

    fn progress(&self, percent: u8, message: &str) {
        self.events.emit(SyncEvent::SyncProgress {
            percent,
            message: message.to_string(),
        });
    }
}
