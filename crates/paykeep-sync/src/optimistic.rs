//! Synthetic responses returned for mutations captured while offline.
//!
//! Every response is `202 Accepted (offline)` with `x-offline: true`; the
//! body depends on the route so the UI can render the change right away.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};

use paykeep_core::constants::{OFFLINE_PAYMENT_PREFIX, OFFLINE_RESPONSE_HEADER};
use paykeep_core::models::{FormEntry, HttpMethod, HttpResponse, SerializedBody};

macro_rules! route {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($pattern).ok());
    };
}

route!(RE_PAYMENTS, r"^/payments/?$");
route!(RE_PAYMENT, r"^/payments/([^/]+)/?$");
route!(RE_PAYMENT_COMPLETE, r"^/payments/([^/]+)/complete/?$");
route!(RE_PAYMENT_UPLOAD, r"^/files/upload/payment/([^/]+)/?$");

pub const OFFLINE_STATUS: u16 = 202;
pub const OFFLINE_DELETE_STATUS: u16 = 204;
pub const OFFLINE_STATUS_TEXT: &str = "Accepted (offline)";

/// A synthetic response plus the provisional id it handed out, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticResponse {
    pub response: HttpResponse,
    pub offline_id: Option<String>,
}

/// Builds optimistic responses for one API base URL.
#[derive(Debug, Clone)]
pub struct OptimisticResponder {
    base_path: String,
}

impl OptimisticResponder {
    /// `base_url` is the transport base; its path (`/api`) is stripped
    /// from request URLs before routes are matched.
    pub fn new(base_url: &str) -> Self {
        let base_path = match reqwest::Url::parse(base_url) {
            Ok(url) => url.path().trim_end_matches('/').to_string(),
            Err(_) => base_url.trim_end_matches('/').to_string(),
        };
        Self { base_path }
    }

    /// Path of `url` relative to the API base, without query or fragment.
    pub fn route_path(&self, url: &str) -> String {
        let path = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => {
                let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
                url[..end].to_string()
            }
        };
        if self.base_path.is_empty() {
            return path;
        }
        match path.strip_prefix(&self.base_path) {
            Some("") => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => path,
        }
    }

    pub fn build(
        &self,
        method: HttpMethod,
        url: &str,
        body: &SerializedBody,
        now: DateTime<Utc>,
    ) -> OptimisticResponse {
        let path = self.route_path(url);
        let now_iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        match (method, body) {
            (HttpMethod::Post, SerializedBody::Json { value }) if matches(&RE_PAYMENTS, &path) => {
                let offline_id = format!("{OFFLINE_PAYMENT_PREFIX}-{}", uuid::Uuid::new_v4());
                let payment = provisional_payment(&offline_id, value, &now_iso);
                OptimisticResponse {
                    response: accepted(Some(&payment)),
                    offline_id: Some(offline_id),
                }
            }
            (HttpMethod::Put, SerializedBody::Json { value }) => {
                if let Some(id) = capture(&RE_PAYMENT_COMPLETE, &path) {
                    let completed_at = value
                        .get("completedAt")
                        .filter(|v| !v.is_null())
                        .cloned()
                        .unwrap_or_else(|| Value::String(now_iso.clone()));
                    let body = json!({"id": id, "status": "completed", "completedAt": completed_at});
                    return plain(accepted(Some(&body)));
                }
                if let Some(id) = capture(&RE_PAYMENT, &path) {
                    let mut merged = Map::new();
                    merged.insert("id".into(), Value::String(id));
                    if let Value::Object(changes) = value {
                        merged.extend(changes.clone());
                    }
                    return plain(accepted(Some(&Value::Object(merged))));
                }
                plain(accepted(Some(value)))
            }
            (HttpMethod::Put, _) if capture(&RE_PAYMENT_COMPLETE, &path).is_some() => {
                let id = capture(&RE_PAYMENT_COMPLETE, &path).unwrap_or_default();
                let body = json!({"id": id, "status": "completed", "completedAt": now_iso});
                plain(accepted(Some(&body)))
            }
            (HttpMethod::Delete, _) if matches(&RE_PAYMENT, &path) => {
                plain(offline_headers(HttpResponse::new(OFFLINE_DELETE_STATUS)))
            }
            (HttpMethod::Post, SerializedBody::FormData { entries })
                if matches(&RE_PAYMENT_UPLOAD, &path) =>
            {
                let file_name = entries
                    .iter()
                    .find_map(|entry| match entry {
                        FormEntry::File { file_name, .. } => Some(file_name.clone()),
                        FormEntry::Text { .. } => None,
                    })
                    .unwrap_or_default();
                let body = json!({"success": true, "fileName": file_name});
                plain(accepted(Some(&body)))
            }
            (_, SerializedBody::Json { value }) => plain(accepted(Some(value))),
            _ => plain(accepted(None)),
        }
    }
}

fn matches(re: &LazyLock<Option<Regex>>, path: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(path))
}

fn capture(re: &LazyLock<Option<Regex>>, path: &str) -> Option<String> {
    re.as_ref()?
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn offline_headers(response: HttpResponse) -> HttpResponse {
    response
        .with_header(OFFLINE_RESPONSE_HEADER, "true")
        .with_header("x-status-text", OFFLINE_STATUS_TEXT)
}

fn accepted(body: Option<&Value>) -> HttpResponse {
    let response = match body {
        Some(value) => HttpResponse::with_json(OFFLINE_STATUS, value),
        None => HttpResponse::new(OFFLINE_STATUS),
    };
    offline_headers(response)
}

fn plain(response: HttpResponse) -> OptimisticResponse {
    OptimisticResponse {
        response,
        offline_id: None,
    }
}

/// Loose numeric coercion: numbers pass, numeric strings parse, anything
/// else becomes null.
fn as_number(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn non_empty(value: Option<&Value>) -> Value {
    match value {
        Some(v) if truthy(Some(v)) => v.clone(),
        _ => Value::Null,
    }
}

fn provisional_payment(offline_id: &str, payload: &Value, now_iso: &str) -> Value {
    json!({
        "id": offline_id,
        "title": payload.get("title").cloned().unwrap_or(Value::Null),
        "amount": as_number(payload.get("amount")),
        "dueDate": payload.get("dueDate").cloned().unwrap_or(Value::Null),
        "status": "upcoming",
        "remind": truthy(payload.get("remind")),
        "createdAt": now_iso,
        "updatedAt": now_iso,
        "builtinIconName": non_empty(payload.get("builtinIconName")),
        "category": Value::Null,
        "seriesId": non_empty(payload.get("seriesId")),
        "completedAt": Value::Null,
        "fileName": Value::Null,
        "filePath": Value::Null,
        "isVirtual": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn responder() -> OptimisticResponder {
        OptimisticResponder::new("http://localhost:5000/api")
    }

    fn json_body(value: Value) -> SerializedBody {
        SerializedBody::Json { value }
    }

    #[test]
    fn route_path_strips_host_base_and_query() {
        let r = responder();
        assert_eq!(r.route_path("http://localhost:5000/api/payments?x=1"), "/payments");
        assert_eq!(r.route_path("/api/payments/7/complete"), "/payments/7/complete");
        assert_eq!(r.route_path("/payments#top"), "/payments");
        assert_eq!(r.route_path("/apiary/x"), "/apiary/x");
    }

    #[test]
    fn offline_create_hands_out_a_provisional_payment() {
        let built = responder().build(
            HttpMethod::Post,
            "/payments",
            &json_body(json!({"title": "Rent", "amount": "500", "dueDate": "2024-03-05"})),
            now(),
        );
        let offline_id = built.offline_id.clone().unwrap();
        assert!(offline_id.starts_with("payment-"));

        let response = built.response;
        assert_eq!(response.status, 202);
        assert!(response.is_offline_synthetic());
        let body: Value = response.json().unwrap();
        assert_eq!(body["id"], offline_id.as_str());
        assert_eq!(body["title"], "Rent");
        assert_eq!(body["amount"], 500.0);
        assert_eq!(body["status"], "upcoming");
        assert_eq!(body["isVirtual"], true);
        assert_eq!(body["remind"], false);
        assert_eq!(body["createdAt"], "2024-03-01T12:00:00.000Z");
        assert!(body["seriesId"].is_null());
    }

    #[test]
    fn update_merges_changes_over_the_id() {
        let built = responder().build(
            HttpMethod::Put,
            "/payments/7",
            &json_body(json!({"title": "Water"})),
            now(),
        );
        assert_eq!(built.offline_id, None);
        let body: Value = built.response.json().unwrap();
        assert_eq!(body, json!({"id": "7", "title": "Water"}));
    }

    #[test]
    fn complete_uses_request_timestamp_or_now() {
        let r = responder();
        let given = r.build(
            HttpMethod::Put,
            "/payments/7/complete",
            &json_body(json!({"completedAt": "2024-02-28T00:00:00.000Z"})),
            now(),
        );
        let body: Value = given.response.json().unwrap();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["completedAt"], "2024-02-28T00:00:00.000Z");

        let defaulted = r.build(HttpMethod::Put, "/payments/7/complete", &SerializedBody::None, now());
        let body: Value = defaulted.response.json().unwrap();
        assert_eq!(body["completedAt"], "2024-03-01T12:00:00.000Z");
    }

    #[test]
    fn delete_is_no_content() {
        let built = responder().build(HttpMethod::Delete, "/payments/7", &SerializedBody::None, now());
        assert_eq!(built.response.status, 204);
        assert!(built.response.body.is_empty());
        assert!(built.response.is_offline_synthetic());
    }

    #[test]
    fn upload_reports_the_first_file_name() {
        let entries = vec![
            FormEntry::text("note", "x"),
            FormEntry::file("file", "receipt.pdf", "application/pdf", 0, vec![1]),
        ];
        let built = responder().build(
            HttpMethod::Post,
            "/files/upload/payment/7",
            &SerializedBody::FormData { entries },
            now(),
        );
        let body: Value = built.response.json().unwrap();
        assert_eq!(body, json!({"success": true, "fileName": "receipt.pdf"}));
    }

    #[test]
    fn other_routes_echo_json_or_stay_empty() {
        let r = responder();
        let echoed = r.build(
            HttpMethod::Post,
            "/categories",
            &json_body(json!({"name": "Home"})),
            now(),
        );
        assert_eq!(echoed.response.json::<Value>().unwrap(), json!({"name": "Home"}));

        let empty = r.build(HttpMethod::Delete, "/categories/2", &SerializedBody::None, now());
        assert_eq!(empty.response.status, 202);
        assert!(empty.response.body.is_empty());
    }
}
