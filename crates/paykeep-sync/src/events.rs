//! Multi-subscriber event stream and the default toast sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use paykeep_core::models::{ConnectionStatus, QueueStats, Toast, ToastKind};
use paykeep_core::traits::ToastSink;

/// Everything a UI needs to render connectivity, sync and queue state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    ConnectionChanged { status: ConnectionStatus },
    SyncStarted,
    SyncProgress { percent: u8, message: String },
    SyncCompleted { timestamp: DateTime<Utc> },
    SyncFailed { message: String },
    QueueUpdated { stats: QueueStats },
}

/// Cloneable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn emit(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Writes toasts to the log. Used when no UI sink is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingToastSink;

impl ToastSink for TracingToastSink {
    fn show(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Error => tracing::error!(toast = %toast.message, "toast"),
            ToastKind::Warning => tracing::warn!(toast = %toast.message, "toast"),
            ToastKind::Info | ToastKind::Success => {
                tracing::info!(toast = %toast.message, "toast")
            }
        }
    }
}
