//! Service wiring, background loop and user actions on the queue.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use paykeep_core::config::PaykeepConfig;
use paykeep_core::errors::PaykeepError;
use paykeep_core::models::{ConnectionStatus, HttpMethod, HttpRequest, QueueEntryStatus};
use paykeep_core::traits::{Clock, QueueStore};
use paykeep_storage::StorageEngine;
use paykeep_sync::{SyncDeps, SyncService};
use test_fixtures::builders::queued_json;
use test_fixtures::{load_fixture_value, ManualClock, MockTransport, RecordingToastSink};

struct Harness {
    service: Arc<SyncService>,
    transport: Arc<MockTransport>,
    storage: Arc<StorageEngine>,
    clock: Arc<ManualClock>,
}

fn harness(online: bool) -> Harness {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let transport = MockTransport::new();
    let clock = Arc::new(ManualClock::fixed());
    let deps = SyncDeps {
        queue: storage.clone(),
        cache: storage.clone(),
        transport: transport.clone(),
        toasts: Arc::new(RecordingToastSink::new()),
        clock: clock.clone(),
    };
    let service = SyncService::new(PaykeepConfig::default(), deps, online).unwrap();
    Harness {
        service,
        transport,
        storage,
        clock,
    }
}

fn script_server(transport: &MockTransport) {
    transport.respond(HttpMethod::Get, "/payments/list", 200, load_fixture_value("payments_list.json"));
    transport.respond(HttpMethod::Get, "/archive", 200, load_fixture_value("archive.json"));
    transport.respond(HttpMethod::Get, "/categories", 200, load_fixture_value("categories.json"));
    transport.respond(HttpMethod::Get, "/user/profile", 200, load_fixture_value("user_profile.json"));
}

/// Poll `check` until it holds or two seconds pass.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let mut config = PaykeepConfig::default();
    config.queue.max_attempts = 0;
    let deps = SyncDeps {
        queue: storage.clone(),
        cache: storage,
        transport: MockTransport::new(),
        toasts: Arc::new(RecordingToastSink::new()),
        clock: Arc::new(ManualClock::fixed()),
    };
    assert!(matches!(
        SyncService::new(config, deps, true),
        Err(PaykeepError::ConfigError { .. })
    ));
}

#[tokio::test]
async fn from_config_opens_a_file_backed_service() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PaykeepConfig::default();
    config.storage.db_path = dir.path().join("paykeep.db").display().to_string();

    let service = SyncService::from_config(config, false).unwrap();

    assert_eq!(service.status(), ConnectionStatus::Offline);
    assert_eq!(service.queue_stats().await.unwrap().total, 0);
    assert!(dir.path().join("paykeep.db").exists());
}

#[tokio::test]
async fn start_and_stop_own_one_task() {
    let h = harness(false);
    h.service.start().await;
    h.service.start().await;
    assert!(h.service.is_running().await);

    h.service.stop().await;
    assert!(!h.service.is_running().await);

    h.service.start().await;
    assert!(h.service.is_running().await);
    h.service.stop().await;
}

#[tokio::test]
async fn reconnect_replays_then_refreshes_the_cache() {
    let h = harness(false);
    script_server(&h.transport);
    h.service.start().await;
    h.service
        .client()
        .send(HttpRequest::new(HttpMethod::Post, "/payments").json(json!({"title": "Rent", "amount": 500})))
        .await
        .unwrap();

    h.service.set_online(true);

    let service = h.service.clone();
    assert!(
        eventually(|| {
            let service = service.clone();
            async move { service.last_sync().await.unwrap().is_some() }
        })
        .await
    );
    assert_eq!(h.service.queue_stats().await.unwrap().total, 0);
    assert_eq!(h.transport.count(HttpMethod::Post, "/payments"), 1);
    assert_eq!(h.service.offline_data().await.unwrap().payments.len(), 4);
    h.service.stop().await;
}

#[tokio::test]
async fn queued_work_is_replayed_at_startup() {
    let h = harness(true);
    let entry = queued_json(HttpMethod::Put, "/payments/3", json!({"title": "Gym"}), h.clock.now());
    h.storage.enqueue(&entry).await.unwrap();

    h.service.start().await;

    let service = h.service.clone();
    assert!(
        eventually(|| {
            let service = service.clone();
            async move { service.queue_stats().await.unwrap().total == 0 }
        })
        .await
    );
    assert_eq!(h.transport.count(HttpMethod::Put, "/payments/3"), 1);
    h.service.stop().await;
}

#[tokio::test]
async fn retrying_a_failed_entry_puts_it_back_in_line() {
    let h = harness(true);
    let entry = queued_json(HttpMethod::Put, "/payments/3", json!({"title": "Gym"}), h.clock.now());
    h.storage.enqueue(&entry).await.unwrap();
    h.transport.respond(HttpMethod::Put, "/payments/3", 409, json!({"error": "conflict"}));
    h.transport.respond(HttpMethod::Put, "/payments/3", 200, json!({"id": 3}));

    h.service.drain().await;
    let failed = h.storage.get_queued(&entry.id).await.unwrap().unwrap();
    assert_eq!(failed.status, QueueEntryStatus::Failed);

    h.clock.advance(Duration::from_secs(30));
    let retried = h.service.retry_failed(&entry.id).await.unwrap();
    assert_eq!(retried.status, QueueEntryStatus::Pending);
    assert_eq!(retried.attempts, 0);
    assert_eq!(retried.last_error, None);
    assert_eq!(retried.available_at, h.clock.now());

    let report = h.service.drain().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(h.service.queue_stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn retrying_an_unknown_entry_is_not_found() {
    let h = harness(true);
    let err = h.service.retry_failed("request-missing").await.unwrap_err();
    assert!(matches!(err, PaykeepError::QueuedRequestNotFound { .. }));
}

#[tokio::test]
async fn only_failed_entries_are_discarded() {
    let h = harness(true);
    let now = h.clock.now();
    let doomed = queued_json(HttpMethod::Delete, "/payments/1", json!(null), now);
    let waiting = queued_json(HttpMethod::Delete, "/payments/2", json!(null), now);
    h.storage.enqueue(&doomed).await.unwrap();
    h.storage.enqueue(&waiting).await.unwrap();
    h.transport.respond(HttpMethod::Delete, "/payments/1", 400, json!({}));
    h.transport.fail_network(HttpMethod::Delete, "/payments/2");
    h.service.drain().await;

    assert!(!h.service.discard_failed(&waiting.id).await.unwrap());
    assert!(h.service.discard_failed(&doomed.id).await.unwrap());
    assert!(!h.service.discard_failed(&doomed.id).await.unwrap());

    let stats = h.service.queue_stats().await.unwrap();
    assert_eq!((stats.pending, stats.failed), (1, 0));
}

#[tokio::test]
async fn clear_failed_keeps_pending_entries() {
    let h = harness(true);
    let now = h.clock.now();
    for n in 1..=2 {
        let path = format!("/payments/{n}");
        h.storage
            .enqueue(&queued_json(HttpMethod::Delete, &path, json!(null), now))
            .await
            .unwrap();
        h.transport.respond(HttpMethod::Delete, &path, 403, json!({}));
    }
    h.storage
        .enqueue(&queued_json(HttpMethod::Delete, "/payments/3", json!(null), now))
        .await
        .unwrap();
    h.transport.respond(HttpMethod::Delete, "/payments/3", 502, json!({}));
    h.service.drain().await;

    assert_eq!(h.service.clear_failed().await.unwrap(), 2);
    let remaining = h.service.list_queued().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].url, "/payments/3");
}

#[tokio::test]
async fn clearing_offline_data_empties_cache_and_queue() {
    let h = harness(true);
    script_server(&h.transport);
    h.service.force_sync().await.unwrap();
    h.service.set_online(false);
    h.service
        .client()
        .send(HttpRequest::new(HttpMethod::Delete, "/payments/1"))
        .await
        .unwrap();

    h.service.clear_offline_data().await.unwrap();

    let data = h.service.offline_data().await.unwrap();
    assert!(data.payments.is_empty() && data.categories.is_empty() && data.user.is_none());
    assert_eq!(h.service.last_sync().await.unwrap(), None);
    assert_eq!(h.service.queue_stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn snapshots_restore_the_cache() {
    let h = harness(true);
    script_server(&h.transport);
    h.service.force_sync().await.unwrap();
    let snapshot = h.service.export_snapshot().await.unwrap();
    assert_eq!(snapshot.version, 1);

    h.service.clear_offline_data().await.unwrap();
    h.service.import_snapshot(&snapshot).await.unwrap();

    let data = h.service.offline_data().await.unwrap();
    assert_eq!(data.payments.len(), 4);
    assert_eq!(data.categories.len(), 2);
    assert_eq!(h.service.last_sync().await.unwrap(), snapshot.last_sync);
}
