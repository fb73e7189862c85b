//! Shared test fixtures for integration tests.
#![allow(dead_code)] // Each test binary uses its own subset

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use issueview::capability::{
    AlertSink, AuthSession, CapabilityContext, HttpClient, MapHelper, TextFormatters,
};
use issueview::models::Meta;
use issueview::{Config, TrackerStore};

/// One request the mock transport saw.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Request path.
    pub path: String,
    /// Query parameters in send order.
    pub params: Vec<(String, String)>,
}

/// One scripted reply.
pub struct ScriptedResponse {
    /// Body to resolve with, or an error message to reject with.
    pub body: Result<Value, String>,
    /// Artificial network latency before completing.
    pub delay: Duration,
}

impl ScriptedResponse {
    /// An immediate success.
    pub fn ok(body: Value) -> Self {
        Self {
            body: Ok(body),
            delay: Duration::ZERO,
        }
    }

    /// A success delivered after the given latency.
    pub fn ok_after(body: Value, delay: Duration) -> Self {
        Self {
            body: Ok(body),
            delay,
        }
    }

    /// An immediate rejection.
    pub fn err(message: &str) -> Self {
        Self {
            body: Err(message.to_string()),
            delay: Duration::ZERO,
        }
    }
}

/// Scripted backend transport: requests are recorded in arrival order and
/// answered from a response queue.
#[derive(Default)]
pub struct MockHttp {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
}

impl MockHttp {
    /// Creates an empty mock; every request fails until responses are queued.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends a scripted response to the queue.
    pub fn enqueue(&self, response: ScriptedResponse) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(response);
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn get(&self, path: &str, params: &[(String, String)]) -> anyhow::Result<Value> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(RecordedRequest {
                path: path.to_string(),
                params: params.to_vec(),
            });

        let response = self
            .responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front();

        match response {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.body.map_err(|msg| anyhow::anyhow!(msg))
            }
            None => anyhow::bail!("unexpected request to {path}"),
        }
    }
}

/// Alert sink that records what scripts fired at it.
#[derive(Default)]
pub struct RecordingAlerts {
    /// Alert messages in fire order.
    pub alerts: Mutex<Vec<String>>,
    /// Modal messages in fire order.
    pub modals: Mutex<Vec<String>>,
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .expect("alert lock poisoned")
            .push(message.to_string());
    }

    fn modal(&self, message: &str) {
        self.modals
            .lock()
            .expect("alert lock poisoned")
            .push(message.to_string());
    }
}

/// Fixed-session auth accessor.
pub struct FixedAuth;

impl AuthSession for FixedAuth {
    fn session(&self) -> Value {
        json!({"login": "admin", "token_scope": "tracker"})
    }
}

/// Map helper that turns values into a fake link record.
pub struct LinkMap;

impl MapHelper for LinkMap {
    fn resolve(&self, value: &Value) -> Value {
        json!({"map": value})
    }
}

/// Minimal pure formatter implementations for tests.
pub struct TestFormatters;

impl TextFormatters for TestFormatters {
    fn parse_number(&self, value: &str) -> Option<f64> {
        value.trim().replace(',', ".").parse().ok()
    }

    fn escape_html(&self, s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn nl2br(&self, s: &str) -> String {
        s.replace('\n', "<br>")
    }

    fn auto_link(&self, s: &str) -> String {
        format!("<a href=\"{s}\">{s}</a>")
    }
}

/// The meta payload used across the integration tests.
pub fn sample_meta_value() -> Value {
    json!({
        "projects": [
            {"acronym": "AB", "filters": [{"filter": "open", "other": 1}]}
        ],
        "filters": {"open": "Open Issues"}
    })
}

/// Typed form of [`sample_meta_value`].
pub fn sample_meta() -> Meta {
    serde_json::from_value(sample_meta_value()).expect("sample meta deserializes")
}

/// A store over a fresh mock transport.
pub fn mock_store() -> (Arc<MockHttp>, Arc<TrackerStore>) {
    let http = MockHttp::new();
    let store = Arc::new(TrackerStore::new(
        Arc::clone(&http) as Arc<dyn HttpClient>,
        &Config::new(),
    ));
    (http, store)
}

/// A full capability context plus its collaborators, for viewer tests.
pub struct TestHost {
    /// The assembled capability context.
    pub ctx: CapabilityContext,
    /// The mock transport behind both the store and script `http_get`.
    pub http: Arc<MockHttp>,
    /// The store shared with scripts.
    pub store: Arc<TrackerStore>,
    /// Recording alert sink.
    pub alerts: Arc<RecordingAlerts>,
}

/// Builds a capability context over recording collaborators, with the
/// sample meta preloaded into the store.
pub fn test_host() -> TestHost {
    let (http, store) = mock_store();
    store.set_meta(Some(sample_meta()));
    let alerts = Arc::new(RecordingAlerts::default());
    let ctx = CapabilityContext::new(
        Arc::clone(&http) as Arc<dyn HttpClient>,
        Arc::new(FixedAuth),
        Arc::clone(&store),
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        Arc::new(LinkMap),
        Arc::new(TestFormatters),
        "pwa",
    );
    TestHost {
        ctx,
        http,
        store,
        alerts,
    }
}
