//! `HttpTransport` over an async reqwest client with timeout and gzip.
//!
//! The transport never retries: retry policy belongs to the queue
//! processor, which persists attempts and backoff across restarts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use paykeep_core::config::TransportConfig;
use paykeep_core::errors::TransportError;
use paykeep_core::models::{FormEntry, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use paykeep_core::traits::HttpTransport;

/// Convert a reqwest error into a TransportError.
fn transport_err(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if e.is_builder() {
        TransportError::InvalidRequest {
            reason: e.to_string(),
        }
    } else {
        TransportError::Network {
            reason: e.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(config.gzip)
            .build()
            .map_err(|e| TransportError::InvalidRequest {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Absolute URLs pass through; anything else is joined onto the base.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    fn build_form(entries: Vec<FormEntry>) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for entry in entries {
            form = match entry {
                FormEntry::Text { name, value } => form.text(name, value),
                FormEntry::File {
                    name,
                    file_name,
                    mime_type,
                    blob,
                    ..
                } => {
                    let part = Part::bytes(blob)
                        .file_name(file_name)
                        .mime_str(&mime_type)
                        .map_err(|e| TransportError::InvalidRequest {
                            reason: format!("invalid mime type {mime_type}: {e}"),
                        })?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.resolve_url(&request.url);
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url);

        let is_form = matches!(request.body, RequestBody::Form(_));
        for (name, value) in &request.headers {
            // reqwest sets the multipart content type with a fresh boundary.
            if is_form && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(entries) => builder.multipart(Self::build_form(entries)?),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        tracing::debug!(method = %request.method, url = %url, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| transport_err(e, self.timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_err(e, self.timeout))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&TransportConfig {
            base_url: "http://localhost:5000/api/".into(),
            ..TransportConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn relative_urls_join_the_base() {
        let t = transport();
        assert_eq!(t.resolve_url("/payments/list"), "http://localhost:5000/api/payments/list");
        assert_eq!(t.resolve_url("categories"), "http://localhost:5000/api/categories");
        assert_eq!(t.resolve_url("https://other.example/x"), "https://other.example/x");
    }

    #[test]
    fn bad_mime_type_is_an_invalid_request() {
        let err = ReqwestTransport::build_form(vec![FormEntry::file(
            "file",
            "x.bin",
            "not a mime",
            0,
            vec![0],
        )])
        .err()
        .unwrap();
        assert!(matches!(err, TransportError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let t = ReqwestTransport::new(&TransportConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..TransportConfig::default()
        })
        .unwrap();
        let err = t.send(HttpRequest::get("/ping")).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }
}
