//! The offline-aware request path every UI call goes through.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use paykeep_core::config::QueueConfig;
use paykeep_core::errors::PaykeepResult;
use paykeep_core::models::{ConnectionStatus, HttpRequest, HttpResponse};
use paykeep_core::traits::{Clock, HttpTransport, QueueStore};
use paykeep_observability::tracing_setup::events;

use crate::connectivity::ConnectivityMonitor;
use crate::optimistic::OptimisticResponder;
use crate::queue_stats::QueueStatsTracker;
use crate::serializer;

/// Sends requests, or captures mutations while offline.
///
/// A mutating request (anything but GET) issued while the monitor reports
/// OFFLINE is not transmitted: it is serialized, enqueued and answered
/// with an optimistic `202`. Replays from the queue carry the replay
/// header and always go to the transport, as do all GETs.
pub struct OfflineAwareClient {
    transport: Arc<dyn HttpTransport>,
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<dyn QueueStore>,
    stats: Arc<QueueStatsTracker>,
    responder: OptimisticResponder,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
}

impl OfflineAwareClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        monitor: Arc<ConnectivityMonitor>,
        queue: Arc<dyn QueueStore>,
        stats: Arc<QueueStatsTracker>,
        responder: OptimisticResponder,
        config: QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            monitor,
            queue,
            stats,
            responder,
            config,
            clock,
        }
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Send `request`, or queue it if it is a mutation made while offline.
    ///
    /// Any HTTP status is `Ok`; use [`HttpResponse::error_for_status`] to
    /// reject non-success responses.
    pub async fn send(&self, request: HttpRequest) -> PaykeepResult<HttpResponse> {
        if self.should_queue(&request) {
            return self.enqueue_offline(request).await;
        }
        Ok(self.transport.send(request).await?)
    }

    /// GET `path` and decode a successful JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PaykeepResult<T> {
        let response = self.send(HttpRequest::get(path)).await?.error_for_status()?;
        Ok(response.json()?)
    }

    fn should_queue(&self, request: &HttpRequest) -> bool {
        request.method.is_mutating()
            && !request.is_replay()
            && self.monitor.status() == ConnectionStatus::Offline
    }

    async fn enqueue_offline(&self, request: HttpRequest) -> PaykeepResult<HttpResponse> {
        let now = self.clock.now();
        let mut entry = serializer::to_queued(&request, self.config.max_attempts, now)?;
        let optimistic = self
            .responder
            .build(entry.method, &entry.url, &entry.body, now);
        entry.offline_id = optimistic.offline_id;

        self.queue.enqueue(&entry).await?;
        events::request_queued(&entry.id, entry.method.as_str(), &entry.url);
        self.stats.publish().await;

        Ok(optimistic.response)
    }
}
