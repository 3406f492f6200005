//! Scripted in-process transport.
//!
//! Replies are scripted per `(method, path)`. Each route keeps a queue of
//! replies; the last one repeats. Unscripted routes answer `200 {}`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{watch, Semaphore};

use paykeep_core::errors::TransportError;
use paykeep_core::models::{FormEntry, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use paykeep_core::traits::HttpTransport;

#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16, Value),
    Network(String),
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedBody {
    Empty,
    Json(Value),
    Form(Vec<FormEntry>),
    Stream,
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    /// `url` without scheme, host and query.
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: RecordedBody,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Holds requests to one route until released.
#[derive(Debug)]
pub struct Gate {
    released: watch::Sender<bool>,
    arrived: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            released: watch::channel(false).0,
            arrived: Semaphore::new(0),
        }
    }

    /// Let every held and future request through.
    pub fn release(&self) {
        self.released.send_replace(true);
    }

    /// Wait until one more request reached the gate.
    pub async fn arrived(&self) {
        self.arrived.acquire().await.unwrap().forget();
    }

    async fn pass(&self) {
        self.arrived.add_permits(1);
        let mut rx = self.released.subscribe();
        let _ = rx.wait_for(|released| *released).await;
    }
}

type Hook = Box<dyn Fn(&RecordedRequest) + Send + Sync>;

#[derive(Default)]
struct MockState {
    routes: HashMap<(HttpMethod, String), VecDeque<MockReply>>,
    gates: HashMap<(HttpMethod, String), Arc<Gate>>,
    log: Vec<RecordedRequest>,
    offline: bool,
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    hook: Mutex<Option<Hook>>,
}

/// Strip scheme, host and query string.
fn request_path(url: &str) -> String {
    let without_scheme = match url.find("://") {
        Some(i) => {
            let rest = &url[i + 3..];
            rest.find('/').map(|j| &rest[j..]).unwrap_or("/")
        }
        None => url,
    };
    let end = without_scheme
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(without_scheme.len());
    without_scheme[..end].to_string()
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: HttpMethod, path: &str, reply: MockReply) {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a JSON reply for the route.
    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: Value) {
        self.push(method, path, MockReply::Status(status, body));
    }

    /// Queue a connection failure for the route.
    pub fn fail_network(&self, method: HttpMethod, path: &str) {
        self.push(method, path, MockReply::Network("connection refused".into()));
    }

    pub fn fail_timeout(&self, method: HttpMethod, path: &str) {
        self.push(method, path, MockReply::Timeout);
    }

    /// While set, every request fails as a network error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Hold requests to the route until the returned gate is released.
    pub fn gate(&self, method: HttpMethod, path: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        self.state
            .lock()
            .unwrap()
            .gates
            .insert((method, path.to_string()), Arc::clone(&gate));
        gate
    }

    /// Called for each request after it is logged, before it is answered.
    pub fn on_request(&self, hook: impl Fn(&RecordedRequest) + Send + Sync + 'static) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    fn next_reply(&self, key: &(HttpMethod, String)) -> MockReply {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return MockReply::Network("offline".into());
        }
        match state.routes.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => MockReply::Status(200, json!({})),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = match request.body {
            RequestBody::Empty => RecordedBody::Empty,
            RequestBody::Json(value) => RecordedBody::Json(value),
            RequestBody::Form(entries) => RecordedBody::Form(entries),
            RequestBody::Stream(_) => RecordedBody::Stream,
        };
        let recorded = RecordedRequest {
            method: request.method,
            path: request_path(&request.url),
            url: request.url,
            headers: request.headers,
            body,
        };
        let key = (recorded.method, recorded.path.clone());

        let gate = {
            let mut state = self.state.lock().unwrap();
            state.log.push(recorded.clone());
            state.gates.get(&key).cloned()
        };
        // A panicking hook poisons the lock; later requests still run.
        if let Some(hook) = self.hook.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            hook(&recorded);
        }
        if let Some(gate) = gate {
            gate.pass().await;
        }

        match self.next_reply(&key) {
            MockReply::Status(status, body) => Ok(HttpResponse::with_json(status, &body)),
            MockReply::Network(reason) => Err(TransportError::Network { reason }),
            MockReply::Timeout => Err(TransportError::Timeout { timeout_ms: 30_000 }),
        }
    }
}
