//! Offline capture in the request path.

use std::sync::Arc;

use serde_json::{json, Value};

use paykeep_core::config::PaykeepConfig;
use paykeep_core::errors::{PaykeepError, SerializationError};
use paykeep_core::models::{ByteStream, HttpMethod, HttpRequest, SerializedBody};
use paykeep_storage::StorageEngine;
use paykeep_sync::{SyncDeps, SyncEvent, SyncService};
use test_fixtures::builders::upload_form;
use test_fixtures::{ManualClock, MockTransport, RecordedBody, RecordingToastSink};

fn service(online: bool) -> (Arc<SyncService>, Arc<MockTransport>) {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let transport = MockTransport::new();
    let deps = SyncDeps {
        queue: storage.clone(),
        cache: storage,
        transport: transport.clone(),
        toasts: Arc::new(RecordingToastSink::new()),
        clock: Arc::new(ManualClock::fixed()),
    };
    let service = SyncService::new(PaykeepConfig::default(), deps, online).unwrap();
    (service, transport)
}

#[tokio::test]
async fn offline_create_returns_synthetic_success_and_queues() {
    let (service, transport) = service(false);
    let mut events = service.subscribe();

    let response = service
        .client()
        .send(HttpRequest::new(HttpMethod::Post, "/payments").json(json!({"title": "Rent", "amount": 500})))
        .await
        .unwrap();

    assert_eq!(response.status, 202);
    assert!(response.is_offline_synthetic());
    let body: Value = response.json().unwrap();
    assert_eq!(body["title"], "Rent");
    assert_eq!(body["amount"], 500);
    assert_eq!(transport.requests().len(), 0);

    let stats = service.queue_stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.pending, 1);

    let queued = service.list_queued().await.unwrap();
    assert_eq!(queued[0].offline_id.as_deref(), body["id"].as_str());

    match events.try_recv().unwrap() {
        SyncEvent::QueueUpdated { stats } => assert_eq!(stats.total, 1),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn reads_are_never_queued() {
    let (service, transport) = service(false);
    transport.respond(HttpMethod::Get, "/categories", 200, json!([]));

    let response = service.client().send(HttpRequest::get("/categories")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.count(HttpMethod::Get, "/categories"), 1);
    assert_eq!(service.queue_stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn replays_bypass_the_queue_even_offline() {
    let (service, transport) = service(false);

    let request = HttpRequest::new(HttpMethod::Delete, "/payments/9").header("x-offline-replay", "1");
    let response = service.client().send(request).await.unwrap();

    assert!(!response.is_offline_synthetic());
    assert_eq!(transport.count(HttpMethod::Delete, "/payments/9"), 1);
    assert_eq!(service.queue_stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn online_mutations_go_straight_to_the_server() {
    let (service, transport) = service(true);
    transport.respond(HttpMethod::Put, "/payments/4", 200, json!({"id": 4}));

    let response = service
        .client()
        .send(HttpRequest::new(HttpMethod::Put, "/payments/4").json(json!({"title": "x"})))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.count(HttpMethod::Put, "/payments/4"), 1);
    assert_eq!(service.queue_stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn offline_upload_is_stored_entry_by_entry() {
    let (service, _transport) = service(false);

    let request = HttpRequest::new(HttpMethod::Post, "/files/upload/payment/7")
        .header("Content-Type", "multipart/form-data; boundary=----abc")
        .form(upload_form());
    let response = service.client().send(request).await.unwrap();
    let body: Value = response.json().unwrap();
    assert_eq!(body, json!({"success": true, "fileName": "receipt.pdf"}));

    let queued = service.list_queued().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].headers.get("content-type").is_none());
    assert_eq!(queued[0].body, SerializedBody::FormData { entries: upload_form() });
}

#[tokio::test]
async fn unbufferable_bodies_fail_fast_and_are_not_queued() {
    let (service, transport) = service(false);
    let stream: ByteStream = Box::pin(futures::stream::iter(vec![Ok(b"chunk".to_vec())]));

    let err = service
        .client()
        .send(HttpRequest::new(HttpMethod::Post, "/files/upload/payment/7").stream(stream))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaykeepError::SerializationError(SerializationError::UnsupportedBody { .. })
    ));
    assert_eq!(service.queue_stats().await.unwrap().total, 0);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn offline_get_surfaces_the_transport_failure() {
    let (service, transport) = service(false);
    transport.set_offline(true);

    let err = service.client().send(HttpRequest::get("/payments/list")).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(service.queue_stats().await.unwrap().total, 0);
    assert!(matches!(
        transport.requests()[0].body,
        RecordedBody::Empty
    ));
}
