//! Scriptable stand-in for the Connect API
//!
//! Binds an axum server on `127.0.0.1:0` and answers each `"METHOD /path"`
//! key from a queue of scripted responses. The last response for a key is
//! sticky, so a single `respond` call covers any number of requests. Every
//! request is counted and its headers, query and body kept for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::client::CanvaClient;

#[derive(Default)]
struct Script {
    responses: HashMap<String, VecDeque<(StatusCode, Value)>>,
    hits: HashMap<String, u32>,
    last_headers: HeaderMap,
    last_query: Option<String>,
    last_body: Vec<u8>,
}

/// Handle to a running mock provider. The server task lives until the
/// test's runtime shuts down.
#[derive(Clone)]
pub struct MockProvider {
    base_url: String,
    script: Arc<Mutex<Script>>,
}

impl MockProvider {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock provider");
        let addr = listener.local_addr().expect("mock provider addr");
        let script = Arc::new(Mutex::new(Script::default()));

        let handler_script = script.clone();
        let app = axum::Router::new().fallback(move |request: Request<Body>| {
            let script = handler_script.clone();
            async move { answer(script, request).await }
        });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            script,
        }
    }

    /// Queue a response for `key`, e.g. `"GET /users/me/profile"`.
    pub fn respond(&self, key: &str, status: StatusCode, body: Value) {
        self.script
            .lock()
            .unwrap()
            .responses
            .entry(key.to_string())
            .or_default()
            .push_back((status, body));
    }

    /// Number of requests received for `key`.
    pub fn hits(&self, key: &str) -> u32 {
        self.script.lock().unwrap().hits.get(key).copied().unwrap_or(0)
    }

    pub fn last_header(&self, name: &str) -> Option<String> {
        self.script
            .lock()
            .unwrap()
            .last_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_header("authorization")
    }

    pub fn last_query(&self) -> Option<String> {
        self.script.lock().unwrap().last_query.clone()
    }

    pub fn last_body(&self) -> Vec<u8> {
        self.script.lock().unwrap().last_body.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client pointed at this provider.
    pub fn client(&self) -> CanvaClient {
        CanvaClient::new(reqwest::Client::new(), &self.base_url, Duration::from_secs(5))
            .expect("mock base url is valid")
    }
}

async fn answer(script: Arc<Mutex<Script>>, request: Request<Body>) -> (StatusCode, String) {
    let key = format!("{} {}", request.method(), request.uri().path());
    let query = request.uri().query().map(str::to_string);
    let headers = request.headers().clone();
    let body = axum::body::to_bytes(request.into_body(), 64 * 1024 * 1024)
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();

    let mut script = script.lock().unwrap();
    *script.hits.entry(key.clone()).or_default() += 1;
    script.last_headers = headers;
    script.last_query = query;
    script.last_body = body;

    let Some(queue) = script.responses.get_mut(&key) else {
        let body = serde_json::json!({"code": "not_found", "message": format!("no script for {key}")});
        return (StatusCode::NOT_FOUND, body.to_string());
    };
    let (status, body) = if queue.len() > 1 {
        queue.pop_front().expect("queue is non-empty")
    } else {
        queue.front().cloned().expect("queue is non-empty")
    };
    (status, body.to_string())
}
