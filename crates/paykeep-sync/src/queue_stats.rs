//! Queue statistics shared by the interceptor and the processor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use paykeep_core::errors::PaykeepResult;
use paykeep_core::models::QueueStats;
use paykeep_core::traits::QueueStore;

use crate::events::{EventBus, SyncEvent};

/// Combines durable queue counts with the live sweep counters and
/// publishes them as `QueueUpdated`.
pub struct QueueStatsTracker {
    queue: Arc<dyn QueueStore>,
    events: EventBus,
    completed: AtomicUsize,
    in_progress: AtomicBool,
}

impl QueueStatsTracker {
    pub fn new(queue: Arc<dyn QueueStore>, events: EventBus) -> Self {
        Self {
            queue,
            events,
            completed: AtomicUsize::new(0),
            in_progress: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> PaykeepResult<QueueStats> {
        let counts = self.queue.queue_counts().await?;
        Ok(QueueStats::from_counts(
            counts,
            self.completed.load(Ordering::Acquire),
            self.in_progress.load(Ordering::Acquire),
        ))
    }

    /// Emit the current stats. Storage failures are logged, not raised:
    /// a missed event must not fail the operation that triggered it.
    pub async fn publish(&self) -> Option<QueueStats> {
        match self.snapshot().await {
            Ok(stats) => {
                self.events.emit(SyncEvent::QueueUpdated { stats });
                Some(stats)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read queue counts");
                None
            }
        }
    }

    pub(crate) fn begin_sweep(&self) {
        self.completed.store(0, Ordering::Release);
        self.in_progress.store(true, Ordering::Release);
    }

    pub(crate) fn record_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn end_sweep(&self) {
        self.in_progress.store(false, Ordering::Release);
    }
}
