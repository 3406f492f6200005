//! # paykeep-sync
//!
//! Offline-first request handling for the paykeep client. Mutations made
//! while offline are captured by [`OfflineAwareClient`], stored in the
//! durable queue and replayed in order by [`QueueProcessor`] once the
//! [`ConnectivityMonitor`] reports connectivity again. [`SyncOrchestrator`]
//! refreshes the read cache from the authoritative endpoints, and
//! [`SyncService`] wires everything together and owns the background task.

pub mod connectivity;
pub mod events;
pub mod interceptor;
pub mod optimistic;
pub mod orchestrator;
pub mod processor;
pub mod queue_stats;
pub mod serializer;
pub mod service;
pub mod transport;

pub use connectivity::{ConnectivityMonitor, SyncingGuard};
pub use events::{EventBus, SyncEvent, TracingToastSink};
pub use interceptor::OfflineAwareClient;
pub use optimistic::{OptimisticResponder, OptimisticResponse};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncOutcomeStatus, SyncSkipReason};
pub use processor::{DrainReport, QueueProcessor};
pub use queue_stats::QueueStatsTracker;
pub use service::{SyncDeps, SyncService};
pub use transport::ReqwestTransport;
