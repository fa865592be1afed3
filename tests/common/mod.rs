#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use scanwarden::api::{
    AnalysisApi, BackendError, Endpoint, HttpBackend, HttpBody, HttpRequest, HttpResponse,
    RetryPolicy, RetryingClient, TransportClient, API_KEY_HEADER,
};
use scanwarden::sink::RecordingSink;

/// Server URL every scripted client talks to.
pub const BASE_URL: &str = "http://analysis.test";

pub const API_KEY: &str = "test-key";

/// A canned answer for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Text(u16, String),
    Connection(String),
    Timeout,
}

impl Reply {
    fn into_result(self) -> Result<HttpResponse, BackendError> {
        match self {
            Reply::Json(status, body) => Ok(response(status, Bytes::from(body.to_string()))),
            Reply::Text(status, body) => Ok(response(status, Bytes::from(body))),
            Reply::Connection(message) => Err(BackendError::Connection(message)),
            Reply::Timeout => Err(BackendError::Timeout),
        }
    }
}

fn response(status: u16, body: Bytes) -> HttpResponse {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string();
    HttpResponse {
        status,
        reason,
        body,
    }
}

/// A request as the scripted server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// `"METHOD /path"` relative to [`BASE_URL`].
    pub route: String,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    /// `(part name, file name)` of multipart uploads.
    pub parts: Vec<(String, String)>,
    pub api_key: Option<String>,
}

impl Recorded {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct State {
    routes: HashMap<String, VecDeque<Reply>>,
    requests: Vec<Recorded>,
}

/// In-memory server keyed by `"METHOD /path"`.
///
/// Replies queued for a route are served in order; the last one repeats.
/// Unscripted routes answer 404.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, route: &str, reply: Reply) -> &Self {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn on_json(&self, route: &str, status: u16, body: Value) -> &Self {
        self.on(route, Reply::Json(status, body))
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests sent to `route`.
    pub fn calls(&self, route: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.route == route)
            .collect()
    }

    pub fn count(&self, route: &str) -> usize {
        self.calls(route).len()
    }

    /// Routes in the order they were hit.
    pub fn routes(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.route).collect()
    }
}

impl HttpBackend for ScriptedBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let route = format!("{} {}", request.method, path);

        let json = match &request.body {
            HttpBody::Json(bytes) => serde_json::from_slice(bytes).ok(),
            _ => None,
        };
        let parts = match &request.body {
            HttpBody::Multipart(artifacts) => artifacts
                .iter()
                .map(|a| (a.part_name.clone(), a.file_name.clone()))
                .collect(),
            _ => Vec::new(),
        };
        let api_key = request
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut state = self.state.lock().unwrap();
        state.requests.push(Recorded {
            route: route.clone(),
            query: request.query.clone(),
            json,
            parts,
            api_key,
        });

        let reply = match state.routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        drop(state);

        reply
            .unwrap_or_else(|| Reply::Text(404, format!("no route for {}", route)))
            .into_result()
    }
}

/// Everything a test needs to drive the API against a scripted server.
pub struct Harness {
    pub backend: ScriptedBackend,
    pub sink: Arc<RecordingSink>,
    pub cancel: CancellationToken,
    pub api: AnalysisApi<ScriptedBackend>,
}

impl Harness {
    pub fn new(policy: RetryPolicy) -> Self {
        let backend = ScriptedBackend::new();
        let sink = Arc::new(RecordingSink::new());
        let cancel = CancellationToken::new();
        let transport =
            TransportClient::new(backend.clone(), Endpoint::new(BASE_URL, API_KEY)).unwrap();
        let api = AnalysisApi::new(RetryingClient::new(
            transport,
            policy,
            sink.clone(),
            cancel.clone(),
        ));
        Self {
            backend,
            sink,
            cancel,
            api,
        }
    }

    /// Default retry policy (3 attempts, 1s/5s/30s).
    pub fn standard() -> Self {
        Self::new(RetryPolicy::default())
    }

    /// Single attempt per call.
    pub fn no_retries() -> Self {
        Self::new(RetryPolicy::no_retries())
    }

    /// Retries with negligible delays.
    pub fn fast_retries() -> Self {
        Self::new(RetryPolicy {
            max_attempts: 3,
            delays: vec![Duration::from_millis(1)],
        })
    }
}

/// Branch list body for `GET /x/projects/{id}/branches`.
pub fn branches(project_id: i64, names: &[&str]) -> Value {
    Value::Array(
        names
            .iter()
            .enumerate()
            .map(|(n, name)| {
                serde_json::json!({
                    "id": n as i64 + 1,
                    "projectId": project_id,
                    "name": name,
                    "isDefault": n == 0,
                })
            })
            .collect(),
    )
}

/// Job status body for `GET /api/jobs/{id}`.
pub fn job(job_id: &str, status: &str) -> Value {
    serde_json::json!({"jobId": job_id, "status": status})
}
