//! Composition root and background loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use chrono::{DateTime, Utc};

use paykeep_core::config::PaykeepConfig;
use paykeep_core::errors::{PaykeepError, PaykeepResult};
use paykeep_core::models::{
    ConnectionStatus, OfflineData, OfflineSnapshot, Payment, PaymentFilter, QueueEntryStatus,
    QueueStats, QueuedRequest, QueuedRequestPatch,
};
use paykeep_core::traits::{CacheStore, Clock, HttpTransport, QueueStore, SystemClock, ToastSink};
use paykeep_storage::StorageEngine;

use crate::connectivity::ConnectivityMonitor;
use crate::events::{EventBus, SyncEvent, TracingToastSink};
use crate::interceptor::OfflineAwareClient;
use crate::optimistic::OptimisticResponder;
use crate::orchestrator::{SyncOrchestrator, SyncOutcome};
use crate::processor::{DrainReport, QueueProcessor};
use crate::queue_stats::QueueStatsTracker;
use crate::transport::ReqwestTransport;

const EVENT_CAPACITY: usize = 256;
/// Floor for backoff wake-ups, so an entry that stays due (leased by
/// another process) cannot spin the loop.
const MIN_WAKE: Duration = Duration::from_secs(1);
/// How long `stop()` waits for the loop before aborting it.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Everything the service consumes but does not own.
#[derive(Clone)]
pub struct SyncDeps {
    pub queue: Arc<dyn QueueStore>,
    pub cache: Arc<dyn CacheStore>,
    pub transport: Arc<dyn HttpTransport>,
    pub toasts: Arc<dyn ToastSink>,
    pub clock: Arc<dyn Clock>,
}

impl SyncDeps {
    /// Production wiring: SQLite at `storage.db_path`, reqwest, toasts
    /// to the log, wall clock.
    pub fn from_config(config: &PaykeepConfig) -> PaykeepResult<Self> {
        let storage = Arc::new(StorageEngine::open_with_config(
            Path::new(&config.storage.db_path),
            &config.storage,
        )?);
        let transport = Arc::new(ReqwestTransport::new(&config.transport)?);
        Ok(Self {
            queue: storage.clone(),
            cache: storage,
            transport,
            toasts: Arc::new(TracingToastSink),
            clock: Arc::new(SystemClock),
        })
    }
}

/// The offline sync engine, constructed explicitly and shared as `Arc`.
pub struct SyncService {
    config: PaykeepConfig,
    events: EventBus,
    monitor: Arc<ConnectivityMonitor>,
    client: Arc<OfflineAwareClient>,
    processor: Arc<QueueProcessor>,
    orchestrator: Arc<SyncOrchestrator>,
    stats: Arc<QueueStatsTracker>,
    queue: Arc<dyn QueueStore>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    background_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    wake: Notify,
}

impl SyncService {
    pub fn new(
        config: PaykeepConfig,
        deps: SyncDeps,
        initially_online: bool,
    ) -> PaykeepResult<Arc<Self>> {
        config.validate()?;

        let events = EventBus::new(EVENT_CAPACITY);
        let monitor = ConnectivityMonitor::new(initially_online, events.clone());
        let stats = Arc::new(QueueStatsTracker::new(deps.queue.clone(), events.clone()));
        let client = Arc::new(OfflineAwareClient::new(
            deps.transport.clone(),
            monitor.clone(),
            deps.queue.clone(),
            stats.clone(),
            OptimisticResponder::new(&config.transport.base_url),
            config.queue.clone(),
            deps.clock.clone(),
        ));
        let processor = Arc::new(QueueProcessor::new(
            client.clone(),
            deps.queue.clone(),
            monitor.clone(),
            stats.clone(),
            events.clone(),
            deps.toasts.clone(),
            deps.clock.clone(),
            config.queue.clone(),
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            client.clone(),
            processor.clone(),
            deps.queue.clone(),
            deps.cache.clone(),
            monitor.clone(),
            events.clone(),
            deps.clock.clone(),
            config.sync.clone(),
        ));

        Ok(Arc::new(Self {
            config,
            events,
            monitor,
            client,
            processor,
            orchestrator,
            stats,
            queue: deps.queue,
            cache: deps.cache,
            clock: deps.clock,
            background_task: Mutex::new(None),
            shutdown: watch::channel(false).0,
            wake: Notify::new(),
        }))
    }

    /// Open storage and transport from `config`.
    pub fn from_config(config: PaykeepConfig, initially_online: bool) -> PaykeepResult<Arc<Self>> {
        let deps = SyncDeps::from_config(&config)?;
        Self::new(config, deps, initially_online)
    }

    // --- Components ---

    /// The client UI code sends its requests through.
    pub fn client(&self) -> Arc<OfflineAwareClient> {
        self.client.clone()
    }

    pub fn monitor(&self) -> Arc<ConnectivityMonitor> {
        self.monitor.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &PaykeepConfig {
        &self.config
    }

    // --- Connectivity ---

    pub fn status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    pub fn set_online(&self, online: bool) {
        self.monitor.set_platform_online(online);
    }

    /// Probe `transport.probe_path`. Without one configured the current
    /// status is returned unchanged.
    pub async fn probe(&self) -> ConnectionStatus {
        match &self.config.transport.probe_path {
            Some(path) => {
                self.monitor
                    .probe(self.client.transport().as_ref(), path)
                    .await
            }
            None => self.monitor.status(),
        }
    }

    // --- Sync and replay ---

    pub async fn sync(&self) -> PaykeepResult<SyncOutcome> {
        self.orchestrator.sync_all(false).await
    }

    /// Sync regardless of the throttle. Still waits for any running sweep.
    pub async fn force_sync(&self) -> PaykeepResult<SyncOutcome> {
        self.orchestrator.sync_all(true).await
    }

    pub async fn drain(&self) -> DrainReport {
        self.processor.drain().await
    }

    pub fn is_syncing(&self) -> bool {
        self.orchestrator.is_syncing() || self.processor.is_draining()
    }

    // --- Queue ---

    pub async fn queue_stats(&self) -> PaykeepResult<QueueStats> {
        self.stats.snapshot().await
    }

    pub async fn list_queued(&self) -> PaykeepResult<Vec<QueuedRequest>> {
        self.queue.list_queued().await
    }

    /// Put a FAILED entry back in line: attempts reset, due now.
    pub async fn retry_failed(&self, id: &str) -> PaykeepResult<QueuedRequest> {
        let now = self.clock.now();
        let patch = QueuedRequestPatch {
            attempts: Some(0),
            last_error: Some(None),
            available_at: Some(now),
            reservation: Some(None),
            status: Some(QueueEntryStatus::Pending),
            ..QueuedRequestPatch::default()
        };
        let entry = self
            .queue
            .update_queued(id, &patch, now)
            .await?
            .ok_or_else(|| PaykeepError::QueuedRequestNotFound { id: id.to_string() })?;
        tracing::info!(request_id = %id, "failed request requeued");
        self.stats.publish().await;
        self.wake.notify_one();
        Ok(entry)
    }

    /// Drop one FAILED entry. Pending entries are left alone.
    pub async fn discard_failed(&self, id: &str) -> PaykeepResult<bool> {
        let failed = matches!(self.queue.get_queued(id).await?, Some(entry) if entry.is_failed());
        if !failed {
            return Ok(false);
        }
        let deleted = self.queue.delete_queued(id).await?;
        self.stats.publish().await;
        Ok(deleted)
    }

    pub async fn clear_failed(&self) -> PaykeepResult<usize> {
        let cleared = self.queue.clear_failed().await?;
        self.stats.publish().await;
        Ok(cleared)
    }

    // --- Read cache ---

    pub async fn offline_data(&self) -> PaykeepResult<OfflineData> {
        let filter = PaymentFilter::default();
        let (payments, categories, user) = tokio::try_join!(
            self.cache.list_payments(&filter),
            self.cache.list_categories(),
            self.cache.get_user(),
        )?;
        Ok(OfflineData {
            payments,
            categories,
            user,
        })
    }

    pub async fn payments(&self, filter: &PaymentFilter) -> PaykeepResult<Vec<Payment>> {
        self.cache.list_payments(filter).await
    }

    pub async fn last_sync(&self) -> PaykeepResult<Option<DateTime<Utc>>> {
        self.cache.last_sync().await
    }

    /// Wipe the read cache and the queue, FAILED entries included.
    pub async fn clear_offline_data(&self) -> PaykeepResult<()> {
        self.cache.clear_cache().await?;
        let dropped = self.queue.clear_queue().await?;
        tracing::info!(dropped_requests = dropped, "offline data cleared");
        self.stats.publish().await;
        Ok(())
    }

    pub async fn export_snapshot(&self) -> PaykeepResult<OfflineSnapshot> {
        self.cache.export_snapshot().await
    }

    pub async fn import_snapshot(&self, snapshot: &OfflineSnapshot) -> PaykeepResult<()> {
        self.cache.import_snapshot(snapshot).await
    }

    // --- Background loop ---

    /// Spawn the background loop unless it already runs.
    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }
        self.shutdown.send_replace(false);
        let this = Arc::clone(self);
        let shutdown = self.shutdown.subscribe();
        // Subscribe here so transitions before the task first runs are seen.
        let mut status_rx = self.monitor.subscribe();
        let initial = *status_rx.borrow_and_update();
        *guard = Some(tokio::spawn(async move {
            this.run_loop(shutdown, status_rx, initial).await
        }));
        tracing::info!("sync service started");
    }

    /// Signal the loop to stop and wait for it, aborting it after a grace
    /// period. A replay sweep already under way finishes on its own task.
    pub async fn stop(&self) {
        let mut guard = self.background_task.lock().await;
        let Some(mut handle) = guard.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
            handle.abort();
        }
        tracing::info!("sync service stopped");
    }

    pub async fn is_running(&self) -> bool {
        let guard = self.background_task.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn run_loop(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        mut status_rx: watch::Receiver<ConnectionStatus>,
        mut last_status: ConnectionStatus,
    ) {
        if self.config.transport.probe_path.is_some() {
            self.probe().await;
        }
        if self.monitor.is_online() {
            match self.queue.queue_counts().await {
                Ok(counts) if counts.pending > 0 => {
                    self.processor.drain().await;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "could not read queue at startup"),
            }
        }

        let interval = self.config.sync.interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wake_in = self.next_wake().await;
            let backoff = async {
                match wake_in {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    if last_status == ConnectionStatus::Offline && status.is_online() {
                        self.on_reconnect().await;
                    }
                    last_status = status;
                }
                _ = ticker.tick() => self.on_tick().await,
                _ = backoff => {
                    if self.monitor.is_online() {
                        self.processor.drain().await;
                    }
                }
                _ = self.wake.notified() => {}
            }
        }
    }

    /// Delay until the earliest pending entry becomes due, when online.
    async fn next_wake(&self) -> Option<Duration> {
        if !self.monitor.is_online() {
            return None;
        }
        match self.queue.next_available_at().await {
            Ok(Some(at)) => {
                let delay = at
                    .signed_duration_since(self.clock.now())
                    .to_std()
                    .unwrap_or_default();
                Some(delay.max(MIN_WAKE))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read next retry time");
                None
            }
        }
    }

    /// Replay what was queued while offline, then refresh the cache. A
    /// sweep that delivered anything forces the pull past the throttle.
    async fn on_reconnect(&self) {
        let report = self.processor.drain().await;
        let force = report.delivered > 0;
        if let Err(e) = self.orchestrator.sync_all(force).await {
            tracing::warn!(error = %e, "sync after reconnect failed");
        }
    }

    async fn on_tick(&self) {
        if self.config.transport.probe_path.is_some() {
            self.probe().await;
        }
        if self.monitor.is_online() {
            if let Err(e) = self.orchestrator.sync_all(false).await {
                tracing::warn!(error = %e, "periodic sync failed");
            }
        }
    }
}
