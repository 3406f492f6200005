//! Payload builders for queue and cache tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use paykeep_core::models::{
    Category, FormEntry, HttpMethod, Payment, PaymentStatus, QueuedRequest, SerializedBody,
    UserProfile,
};

/// Bytes of a tiny but well-formed PDF.
pub fn sample_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj<<>>endobj\ntrailer<<>>\n%%EOF\n".to_vec()
}

/// A pending JSON mutation created at `now`.
pub fn queued_json(method: HttpMethod, url: &str, body: Value, now: DateTime<Utc>) -> QueuedRequest {
    QueuedRequest::new(
        method,
        url,
        BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
        SerializedBody::Json { value: body },
        5,
        now,
    )
}

/// A pending receipt upload for `payment_id` created at `now`.
pub fn queued_upload(payment_id: &str, now: DateTime<Utc>) -> QueuedRequest {
    QueuedRequest::new(
        HttpMethod::Post,
        format!("/files/upload/payment/{payment_id}"),
        BTreeMap::new(),
        SerializedBody::FormData {
            entries: upload_form(),
        },
        5,
        now,
    )
}

/// A note field followed by a PDF file part.
pub fn upload_form() -> Vec<FormEntry> {
    vec![
        FormEntry::text("note", "march receipt"),
        FormEntry::file(
            "file",
            "receipt.pdf",
            "application/pdf",
            1_709_251_200_000,
            sample_pdf(),
        ),
    ]
}

pub fn payment(id: &str, title: &str, amount: f64, due_date: &str, status: PaymentStatus) -> Payment {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "amount": amount,
        "dueDate": due_date,
        "status": status,
    }))
    .unwrap()
}

/// A payment filed under `category_id`.
pub fn categorized_payment(id: &str, due_date: &str, category_id: &str) -> Payment {
    serde_json::from_value(json!({
        "id": id,
        "title": format!("Payment {id}"),
        "amount": 10.0,
        "dueDate": due_date,
        "status": "upcoming",
        "category": {"id": category_id, "name": format!("Category {category_id}")},
    }))
    .unwrap()
}

pub fn category(id: &str, name: &str) -> Category {
    serde_json::from_value(json!({"id": id, "name": name})).unwrap()
}

pub fn user(id: &str, email: &str) -> UserProfile {
    serde_json::from_value(json!({"id": id, "email": email, "name": "Test User"})).unwrap()
}
