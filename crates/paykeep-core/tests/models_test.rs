use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone, Utc};
use paykeep_core::models::*;
use serde_json::json;

fn ts(ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

// ─── QueuedRequest ───

#[test]
fn queued_request_serializes_camel_case_with_epoch_millis() {
    let mut entry = QueuedRequest::new(
        HttpMethod::Post,
        "/payments",
        BTreeMap::from([("authorization".to_string(), "Bearer t".to_string())]),
        SerializedBody::Json {
            value: json!({"title": "Rent", "amount": 500}),
        },
        5,
        ts(1_700_000_000_000),
    );
    entry.offline_id = Some("payment-1".into());

    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["method"], "POST");
    assert_eq!(value["maxAttempts"], 5);
    assert_eq!(value["status"], "pending");
    assert_eq!(value["createdAt"], 1_700_000_000_000i64);
    assert_eq!(value["availableAt"], 1_700_000_000_000i64);
    assert_eq!(value["body"]["type"], "json");
    assert_eq!(value["body"]["value"]["title"], "Rent");
    assert_eq!(value["offlineId"], "payment-1");
    assert!(value.get("lastError").is_none());
    assert!(value.get("reservation").is_none());

    let back: QueuedRequest = serde_json::from_value(value).unwrap();
    assert_eq!(back, entry);
}

#[test]
fn queued_request_ids_are_prefixed_and_unique() {
    let a = QueuedRequest::new(HttpMethod::Delete, "/x", BTreeMap::new(), SerializedBody::None, 5, Utc::now());
    let b = QueuedRequest::new(HttpMethod::Delete, "/x", BTreeMap::new(), SerializedBody::None, 5, Utc::now());
    assert!(a.id.starts_with("request-"));
    assert_ne!(a.id, b.id);
}

#[test]
fn failed_entries_are_never_due() {
    let now = ts(10_000);
    let mut entry = QueuedRequest::new(HttpMethod::Put, "/p/1", BTreeMap::new(), SerializedBody::None, 5, now);
    assert!(entry.is_due(now));
    entry.available_at = ts(20_000);
    assert!(!entry.is_due(now));
    entry.available_at = now;
    entry.status = QueueEntryStatus::Failed;
    assert!(!entry.is_due(now));
}

#[test]
fn patch_distinguishes_leave_from_clear() {
    let now = ts(0);
    let mut entry = QueuedRequest::new(HttpMethod::Put, "/p/1", BTreeMap::new(), SerializedBody::None, 5, now);
    entry.last_error = Some("HTTP 503".into());
    entry.reservation = Some(Reservation {
        token: "t".into(),
        expires_at: ts(60_000),
    });

    QueuedRequestPatch {
        attempts: Some(2),
        ..Default::default()
    }
    .apply(&mut entry, ts(5));
    assert_eq!(entry.attempts, 2);
    assert_eq!(entry.last_error.as_deref(), Some("HTTP 503"));
    assert!(entry.reservation.is_some());
    assert_eq!(entry.updated_at, ts(5));

    QueuedRequestPatch {
        last_error: Some(None),
        reservation: Some(None),
        ..Default::default()
    }
    .apply(&mut entry, ts(6));
    assert!(entry.last_error.is_none());
    assert!(entry.reservation.is_none());
}

#[test]
fn reservation_expires() {
    let r = Reservation {
        token: "t".into(),
        expires_at: ts(1_000),
    };
    assert!(r.is_active(ts(999)));
    assert!(!r.is_active(ts(1_000)));
}

// ─── Bodies ───

#[test]
fn form_data_body_uses_tagged_layout() {
    let body = SerializedBody::FormData {
        entries: vec![
            FormEntry::text("note", "receipt"),
            FormEntry::file("file", "r.pdf", "application/pdf", 1_699_000_000_000, vec![1, 2, 3]),
        ],
    };
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value["type"], "formData");
    assert_eq!(value["entries"][0]["kind"], "text");
    assert_eq!(value["entries"][1]["kind"], "file");
    assert_eq!(value["entries"][1]["fileName"], "r.pdf");
    assert_eq!(value["entries"][1]["mimeType"], "application/pdf");
    assert_eq!(value["entries"][1]["lastModified"], 1_699_000_000_000i64);
}

#[test]
fn empty_body_serializes_as_none() {
    let value = serde_json::to_value(SerializedBody::None).unwrap();
    assert_eq!(value, json!({"type": "none"}));
}

// ─── HTTP ───

#[test]
fn only_get_is_non_mutating() {
    assert!(!HttpMethod::Get.is_mutating());
    for m in [HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch, HttpMethod::Delete] {
        assert!(m.is_mutating());
    }
}

#[test]
fn method_parses_case_insensitively() {
    assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
    assert!("TRACE".parse::<HttpMethod>().is_err());
}

#[test]
fn replay_header_is_detected_case_insensitively() {
    let req = HttpRequest::new(HttpMethod::Post, "/payments").header("X-Offline-Replay", "1");
    assert!(req.is_replay());
    assert!(!HttpRequest::get("/payments/list").is_replay());
}

#[test]
fn response_status_classification() {
    assert!(HttpResponse::new(201).is_success());
    assert!(HttpResponse::new(304).is_success());
    let err = HttpResponse::new(503).error_for_status().unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[test]
fn synthetic_marker_is_read_from_headers() {
    let resp = HttpResponse::new(202).with_header("X-Offline", "true");
    assert!(resp.is_offline_synthetic());
    assert!(!HttpResponse::new(202).is_offline_synthetic());
}

// ─── Cache models ───

#[test]
fn payment_keeps_unknown_fields_and_accepts_numeric_ids() {
    let raw = json!({
        "id": 17,
        "title": "Rent",
        "amount": 500.0,
        "dueDate": "2024-05-01T00:00:00.000Z",
        "status": "overdue",
        "seriesId": 3,
        "category": {"id": 2, "name": "Housing", "builtinIconName": "home"},
        "series": {"id": 3, "frequency": "monthly"},
        "notes": "landlord"
    });
    let payment: Payment = serde_json::from_value(raw).unwrap();
    assert_eq!(payment.id, "17");
    assert_eq!(payment.series_id.as_deref(), Some("3"));
    assert_eq!(payment.status, PaymentStatus::Overdue);
    assert_eq!(payment.category_id(), Some("2"));
    assert_eq!(payment.extra["notes"], "landlord");
    assert_eq!(payment.extra["series"]["frequency"], "monthly");
    assert_eq!(payment.due_day(), NaiveDate::from_ymd_opt(2024, 5, 1));

    let back = serde_json::to_value(&payment).unwrap();
    assert_eq!(back["notes"], "landlord");
    assert_eq!(back["dueDate"], "2024-05-01T00:00:00.000Z");
}

#[test]
fn payment_filter_matches_each_dimension() {
    let payment: Payment = serde_json::from_value(json!({
        "id": "p1", "title": "Gym", "amount": 30.0, "dueDate": "2024-03-15",
        "status": "upcoming", "category": {"id": "c1", "name": "Health"}
    }))
    .unwrap();
    let march = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

    assert!(PaymentFilter::default().matches(&payment));
    assert!(PaymentFilter::default().status(PaymentStatus::Upcoming).matches(&payment));
    assert!(!PaymentFilter::default().status(PaymentStatus::Completed).matches(&payment));
    assert!(PaymentFilter::default().category("c1").matches(&payment));
    assert!(!PaymentFilter::default().category("c2").matches(&payment));
    assert!(PaymentFilter::default().due_between(march(15), march(15)).matches(&payment));
    assert!(!PaymentFilter::default().due_between(march(16), march(31)).matches(&payment));
}

// ─── Stats ───

#[test]
fn progress_is_capped_below_100_while_running() {
    let stats = QueueStats::from_counts(QueueCounts { pending: 0, failed: 1 }, 4, true);
    assert_eq!(stats.total, 1);
    assert_eq!(stats.progress_percent(), 99);

    let half = QueueStats::from_counts(QueueCounts { pending: 2, failed: 0 }, 2, true);
    assert_eq!(half.progress_percent(), 50);

    let idle = QueueStats::from_counts(QueueCounts::default(), 0, false);
    assert_eq!(idle.progress_percent(), 100);
}

#[test]
fn connection_status_online_includes_syncing() {
    assert!(ConnectionStatus::Online.is_online());
    assert!(ConnectionStatus::Syncing.is_online());
    assert!(!ConnectionStatus::Offline.is_online());
    assert_eq!(ConnectionStatus::Syncing.to_string(), "syncing");
}

#[test]
fn snapshot_carries_version_and_millis() {
    let snapshot = OfflineSnapshot::new(vec![], vec![], None, Some(ts(1_234)));
    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["lastSync"], 1_234);
    let back: OfflineSnapshot = serde_json::from_value(value).unwrap();
    assert_eq!(back, snapshot);
}
