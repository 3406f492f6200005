//! Replay sweep over the durable queue.
//!
//! A sweep walks the queue oldest-first and replays every due entry
//! through the offline-aware client. Delivered entries are deleted;
//! retryable failures back off exponentially until `max_attempts`, after
//! which (or on any other 4xx) the entry turns FAILED and stays queued
//! until the user retries or discards it.
//!
//! An entry whose URL names the provisional id of a create that was not
//! delivered in the same sweep is held back untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::Instrument;

use paykeep_core::config::QueueConfig;
use paykeep_core::errors::{PaykeepError, PaykeepResult};
use paykeep_core::models::{
    HttpResponse, QueueEntryStatus, QueuedRequest, QueuedRequestPatch, Toast,
};
use paykeep_core::traits::{Clock, QueueStore, ToastSink};
use paykeep_observability::tracing_setup::events;
use paykeep_observability::{drain_span, replay_span};

use crate::connectivity::ConnectivityMonitor;
use crate::events::{EventBus, SyncEvent};
use crate::interceptor::OfflineAwareClient;
use crate::queue_stats::QueueStatsTracker;
use crate::serializer;

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    /// Failed retryably and rescheduled.
    pub retried: usize,
    /// Became FAILED during this sweep.
    pub failed: usize,
    /// Not yet due, leased by another sweep, or waiting on an
    /// undelivered create.
    pub skipped: usize,
    /// Connectivity was lost before the queue was exhausted.
    pub aborted_offline: bool,
    /// Storage failure that ended the sweep early.
    pub error: Option<String>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && !self.aborted_offline
    }
}

type SweepFuture = Shared<BoxFuture<'static, DrainReport>>;

pub struct QueueProcessor {
    client: Arc<OfflineAwareClient>,
    queue: Arc<dyn QueueStore>,
    monitor: Arc<ConnectivityMonitor>,
    stats: Arc<QueueStatsTracker>,
    events: EventBus,
    toasts: Arc<dyn ToastSink>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    in_flight: Mutex<Option<SweepFuture>>,
    sweep_seq: AtomicU64,
}

impl QueueProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<OfflineAwareClient>,
        queue: Arc<dyn QueueStore>,
        monitor: Arc<ConnectivityMonitor>,
        stats: Arc<QueueStatsTracker>,
        events: EventBus,
        toasts: Arc<dyn ToastSink>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        Self {
            client,
            queue,
            monitor,
            stats,
            events,
            toasts,
            clock,
            config,
            in_flight: Mutex::new(None),
            sweep_seq: AtomicU64::new(0),
        }
    }

    /// True while a sweep is running.
    pub fn is_draining(&self) -> bool {
        self.slot().is_some()
    }

    /// Flush the queue. Single-flight: while a sweep runs, every caller
    /// awaits that sweep and receives its report.
    ///
    /// The sweep runs on its own task, so dropping the returned future
    /// does not interrupt it.
    pub async fn drain(self: &Arc<Self>) -> DrainReport {
        let sweep = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(sweep) => sweep.clone(),
                None => {
                    let this = Arc::clone(self);
                    let handle = tokio::spawn(async move {
                        let _release = ReleaseSlot(Arc::clone(&this));
                        this.sweep().await
                    });
                    let sweep = async move {
                        handle.await.unwrap_or_else(|e| DrainReport {
                            error: Some(format!("replay sweep task failed: {e}")),
                            ..DrainReport::default()
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(sweep.clone());
                    sweep
                }
            }
        };
        sweep.await
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SweepFuture>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn sweep(&self) -> DrainReport {
        let sweep_id = self.sweep_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.run_sweep().instrument(drain_span!(sweep_id)).await
    }

    async fn run_sweep(&self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.monitor.is_online() {
            report.aborted_offline = true;
            return report;
        }

        let entries = match self.queue.list_queued().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "could not list queued requests");
                report.error = Some(e.to_string());
                return report;
            }
        };
        if entries.iter().all(QueuedRequest::is_failed) {
            return report;
        }

        let _syncing = self.monitor.begin_syncing();
        self.stats.begin_sweep();
        self.stats.publish().await;

        let total = entries.iter().filter(|e| !e.is_failed()).count();
        // Provisional ids whose create has not reached the server.
        let mut unresolved: Vec<&str> = Vec::new();
        for entry in &entries {
            if entry.is_failed() {
                continue;
            }
            if let Some(offline_id) = unresolved
                .iter()
                .find(|id| serializer::url_has_segment(&entry.url, id))
            {
                tracing::debug!(request_id = %entry.id, offline_id = %offline_id, "held behind undelivered create");
                report.skipped += 1;
                unresolved.extend(entry.offline_id.as_deref());
                continue;
            }
            let delivered = if !entry.is_due(self.clock.now()) {
                report.skipped += 1;
                false
            } else if !self.monitor.is_online() {
                report.aborted_offline = true;
                tracing::info!(request_id = %entry.id, "connectivity lost, sweep aborted");
                break;
            } else {
                match self.replay_one(entry, total, &mut report).await {
                    Ok(delivered) => delivered,
                    Err(e) => {
                        tracing::error!(request_id = %entry.id, error = %e, "storage failure during sweep");
                        report.error = Some(e.to_string());
                        break;
                    }
                }
            };
            if !delivered {
                unresolved.extend(entry.offline_id.as_deref());
            }
        }

        self.stats.end_sweep();
        self.stats.publish().await;
        events::drain_completed(
            report.delivered,
            report.retried,
            report.failed,
            report.skipped,
        );
        report
    }

    /// Replay one due entry. `Ok(true)` when the server accepted it.
    async fn replay_one(
        &self,
        entry: &QueuedRequest,
        total: usize,
        report: &mut DrainReport,
    ) -> PaykeepResult<bool> {
        let token = uuid::Uuid::new_v4().to_string();
        let reserved = self
            .queue
            .try_reserve(
                &entry.id,
                &token,
                self.clock.now(),
                self.config.reservation_ttl(),
            )
            .await?;
        if !reserved {
            tracing::debug!(request_id = %entry.id, "entry leased elsewhere or gone");
            report.skipped += 1;
            return Ok(false);
        }
        // Re-read under the lease: an earlier replay may have rewritten the URL.
        let Some(entry) = self.queue.get_queued(&entry.id).await? else {
            report.skipped += 1;
            return Ok(false);
        };
        let entry = &entry;

        let label = format!("{} {}", entry.method, entry.url);
        let outcome = self
            .client
            .send(serializer::to_replay_request(entry))
            .instrument(replay_span!(entry.id, entry.method))
            .await
            .and_then(|response| Ok(response.error_for_status()?));

        match outcome {
            Ok(response) => {
                self.queue.delete_queued(&entry.id).await?;
                events::replay_delivered(&entry.id, response.status, entry.attempts + 1);
                report.delivered += 1;
                if let Some(offline_id) = &entry.offline_id {
                    self.resolve_offline_id(offline_id, &response).await?;
                }
                let completed = self.stats.record_completed();
                self.events.emit(SyncEvent::SyncProgress {
                    percent: progress_percent(completed, total),
                    message: label,
                });
                self.stats.publish().await;
                Ok(true)
            }
            Err(e) => {
                self.record_failure(entry, &token, &e, report).await?;
                Ok(false)
            }
        }
    }

    async fn record_failure(
        &self,
        entry: &QueuedRequest,
        token: &str,
        error: &PaykeepError,
        report: &mut DrainReport,
    ) -> PaykeepResult<()> {
        let attempts = entry.attempts + 1;
        let reason = error.to_string();
        let now = self.clock.now();

        if error.is_retryable() && attempts < entry.max_attempts {
            let delay = self.config.backoff_delay(attempts);
            let available_at = later(now, delay);
            let patch = QueuedRequestPatch {
                attempts: Some(attempts),
                last_error: Some(Some(reason.clone())),
                available_at: Some(available_at),
                ..QueuedRequestPatch::default()
            };
            self.queue.update_queued(&entry.id, &patch, now).await?;
            self.queue.release_reservation(&entry.id, token).await?;
            events::replay_retry_scheduled(&entry.id, attempts, delay.as_millis() as u64, &reason);
            report.retried += 1;
        } else {
            let reason = if error.is_retryable() {
                PaykeepError::QueueExhausted {
                    id: entry.id.clone(),
                    attempts,
                }
                .to_string()
            } else {
                reason
            };
            let patch = QueuedRequestPatch {
                attempts: Some(attempts),
                last_error: Some(Some(reason.clone())),
                reservation: Some(None),
                status: Some(QueueEntryStatus::Failed),
                ..QueuedRequestPatch::default()
            };
            self.queue.update_queued(&entry.id, &patch, now).await?;
            events::replay_failed(&entry.id, attempts, &reason);
            self.toasts.show(Toast::error(format!(
                "Could not sync {} {}: {}",
                entry.method, entry.url, reason
            )));
            report.failed += 1;
        }
        self.stats.publish().await;
        Ok(())
    }

    /// Point queued URLs that still use the provisional id at the id the
    /// server assigned.
    async fn resolve_offline_id(
        &self,
        offline_id: &str,
        response: &HttpResponse,
    ) -> PaykeepResult<()> {
        let server_id = match response.json::<Value>().ok().and_then(|body| match body.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }) {
            Some(id) if id != offline_id => id,
            _ => return Ok(()),
        };
        let rewritten = self
            .queue
            .rewrite_queued_urls(offline_id, &server_id, self.clock.now())
            .await?;
        events::offline_id_resolved(offline_id, &server_id, rewritten);
        Ok(())
    }
}

/// Clears the in-flight slot when the sweep task ends, panics included.
struct ReleaseSlot(Arc<QueueProcessor>);

impl Drop for ReleaseSlot {
    fn drop(&mut self) {
        *self.0.slot() = None;
    }
}

/// `completed / total` in percent, rounded and capped at 99.
fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (completed * 100 + total / 2) / total;
    rounded.min(99) as u8
}

fn later(now: DateTime<Utc>, delay: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_and_never_reports_done() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 99);
    }

    #[test]
    fn clean_report_has_no_error_or_abort() {
        assert!(DrainReport::default().is_clean());
        let aborted = DrainReport {
            aborted_offline: true,
            ..DrainReport::default()
        };
        assert!(!aborted.is_clean());
    }
}
