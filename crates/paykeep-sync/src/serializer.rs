//! Live request <-> durable queue record.
//!
//! JSON bodies are cloned verbatim. Multipart forms are decomposed into
//! ordered entries with file bytes and metadata, so replay can rebuild an
//! equivalent form. Streaming bodies cannot be buffered and are rejected.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use paykeep_core::constants::REPLAY_HEADER;
use paykeep_core::errors::SerializationError;
use paykeep_core::models::{HttpRequest, QueuedRequest, RequestBody, SerializedBody};

/// Value of the replay marker header.
pub const REPLAY_HEADER_VALUE: &str = "1";

pub fn serialize_body(body: &RequestBody) -> Result<SerializedBody, SerializationError> {
    match body {
        RequestBody::Empty => Ok(SerializedBody::None),
        RequestBody::Json(value) => Ok(SerializedBody::Json {
            value: value.clone(),
        }),
        RequestBody::Form(entries) => Ok(SerializedBody::FormData {
            entries: entries.clone(),
        }),
        RequestBody::Stream(_) => Err(SerializationError::UnsupportedBody {
            kind: body.kind().to_string(),
        }),
    }
}

pub fn deserialize_body(body: &SerializedBody) -> RequestBody {
    match body {
        SerializedBody::None => RequestBody::Empty,
        SerializedBody::Json { value } => RequestBody::Json(value.clone()),
        SerializedBody::FormData { entries } => RequestBody::Form(entries.clone()),
    }
}

/// Lower-case header names and drop what must not be stored: the replay
/// marker, and `content-type` of multipart bodies (its boundary is
/// regenerated when the form is rebuilt).
pub fn extract_headers(
    headers: &BTreeMap<String, String>,
    body: &SerializedBody,
) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .filter(|(name, _)| name != REPLAY_HEADER)
        .filter(|(name, _)| !(body.is_form_data() && name == "content-type"))
        .collect()
}

/// Capture a mutating request as a fresh pending queue entry.
pub fn to_queued(
    request: &HttpRequest,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<QueuedRequest, SerializationError> {
    if !request.method.is_mutating() {
        return Err(SerializationError::UnsupportedMethod {
            method: request.method.to_string(),
        });
    }
    let body = serialize_body(&request.body)?;
    let headers = extract_headers(&request.headers, &body);
    Ok(QueuedRequest::new(
        request.method,
        request.url.clone(),
        headers,
        body,
        max_attempts,
        now,
    ))
}

/// Rebuild the outgoing request for `entry`, tagged as a replay.
pub fn to_replay_request(entry: &QueuedRequest) -> HttpRequest {
    let mut request = HttpRequest::new(entry.method, entry.url.clone());
    request.headers = entry.headers.clone();
    request
        .headers
        .insert(REPLAY_HEADER.to_string(), REPLAY_HEADER_VALUE.to_string());
    request.body = deserialize_body(&entry.body);
    request
}

/// True when a whole path segment of `url` equals `segment`. The query
/// string and fragment are ignored.
pub fn url_has_segment(url: &str, segment: &str) -> bool {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    !segment.is_empty() && url[..end].split('/').any(|s| s == segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paykeep_core::models::{FormEntry, HttpMethod};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn segment_match_ignores_partial_and_query_hits() {
        assert!(url_has_segment("/payments/payment-1/complete", "payment-1"));
        assert!(url_has_segment("https://api.test/files/upload/payment/payment-1", "payment-1"));
        assert!(!url_has_segment("/payments/payment-12", "payment-1"));
        assert!(!url_has_segment("/payments?ref=payment-1", "payment-1"));
        assert!(!url_has_segment("/payments", ""));
    }

    #[test]
    fn json_request_is_captured_verbatim() {
        let request = HttpRequest::new(HttpMethod::Post, "/payments")
            .header("Content-Type", "application/json")
            .header("X-Request-Id", "abc")
            .json(json!({"title": "Rent", "amount": 500}));

        let entry = to_queued(&request, 5, now()).unwrap();
        assert!(entry.id.starts_with("request-"));
        assert_eq!(entry.url, "/payments");
        assert_eq!(entry.max_attempts, 5);
        assert_eq!(entry.headers["content-type"], "application/json");
        assert_eq!(entry.headers["x-request-id"], "abc");
        assert_eq!(
            entry.body,
            SerializedBody::Json {
                value: json!({"title": "Rent", "amount": 500})
            }
        );
        assert_eq!(entry.available_at, now());
    }

    #[test]
    fn multipart_drops_content_type_and_keeps_entries_in_order() {
        let entries = vec![
            FormEntry::text("note", "receipt"),
            FormEntry::file("file", "r.pdf", "application/pdf", 1_700_000_000_000, vec![1, 2, 3]),
        ];
        let request = HttpRequest::new(HttpMethod::Post, "/files/upload/payment/7")
            .header("content-type", "multipart/form-data; boundary=xyz")
            .form(entries.clone());

        let entry = to_queued(&request, 5, now()).unwrap();
        assert!(!entry.headers.contains_key("content-type"));
        assert_eq!(entry.body, SerializedBody::FormData { entries: entries.clone() });

        match to_replay_request(&entry).body {
            RequestBody::Form(rebuilt) => assert_eq!(rebuilt, entries),
            other => panic!("expected a form body, got {other:?}"),
        }
    }

    #[test]
    fn replay_marker_is_never_stored_but_always_added_on_replay() {
        let request = HttpRequest::new(HttpMethod::Delete, "/payments/3")
            .header("X-Offline-Replay", "1");
        let entry = to_queued(&request, 5, now()).unwrap();
        assert!(entry.headers.is_empty());
        assert_eq!(entry.body, SerializedBody::None);

        let replay = to_replay_request(&entry);
        assert!(replay.is_replay());
        assert_eq!(replay.method, HttpMethod::Delete);
        assert!(matches!(replay.body, RequestBody::Empty));
    }

    #[test]
    fn streams_are_rejected() {
        let stream: paykeep_core::models::ByteStream =
            Box::pin(futures::stream::iter(vec![Ok(vec![1u8, 2, 3])]));
        let request = HttpRequest::new(HttpMethod::Post, "/files/upload/payment/1").stream(stream);
        let err = to_queued(&request, 5, now()).unwrap_err();
        assert!(matches!(err, SerializationError::UnsupportedBody { .. }));
    }

    #[test]
    fn reads_are_not_queueable() {
        let err = to_queued(&HttpRequest::get("/payments/list"), 5, now()).unwrap_err();
        assert!(matches!(err, SerializationError::UnsupportedMethod { .. }));
    }
}
