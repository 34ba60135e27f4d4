//! Scriptable HTTP stub for exercising the Bassa client over real sockets.
//!
//! Every request, whatever its path, is recorded and answered with the next
//! scripted response, or with the default response once the script runs dry.
//! The stub knows nothing about what the endpoints mean.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// A canned reply.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StubResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

impl StubResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A request as the stub saw it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Case-insensitive lookup of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    script: VecDeque<StubResponse>,
    fallback: StubResponse,
    recorded: Vec<RecordedRequest>,
}

/// Shared script and request log. Cloning shares the same state.
#[derive(Clone, Debug)]
pub struct Stub {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Stub {
    fn default() -> Self {
        Self::new(StubResponse::json(200, &serde_json::json!({})))
    }
}

impl Stub {
    /// A stub answering `fallback` whenever the script is empty.
    pub fn new(fallback: StubResponse) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                script: VecDeque::new(),
                fallback,
                recorded: Vec::new(),
            })),
        }
    }

    /// Queue `response` behind any already scripted ones.
    pub fn push(&self, response: StubResponse) {
        self.lock().script.push_back(response);
    }

    pub fn set_fallback(&self, response: StubResponse) {
        self.lock().fallback = response;
    }

    /// Every request received so far, oldest first.
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.lock().recorded.clone()
    }

    pub fn clear_recorded(&self) {
        self.lock().recorded.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning is ignored so the log stays readable after a test panics.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn answer(&self, request: RecordedRequest) -> StubResponse {
        let mut inner = self.lock();
        inner.recorded.push(request);
        match inner.script.pop_front() {
            Some(response) => response,
            None => inner.fallback.clone(),
        }
    }
}

pub fn app(stub: Stub) -> Router {
    Router::new().fallback(handle).with_state(stub)
}

pub async fn run(listener: TcpListener, stub: Stub) -> Result<(), std::io::Error> {
    axum::serve(listener, app(stub)).await
}

async fn handle(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
        body,
    };
    tracing::debug!(method = %recorded.method, path = %recorded.path, "stub request");

    let reply = stub.answer(recorded);
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &reply.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            headers.append(name, value);
        }
    }
    (status, headers, reply.body).into_response()
}
