//! The capability context handed to compiled viewer scripts.
//!
//! Host services cross into script territory only through this module.
//! The context is assembled once, process-wide, and handed uniformly to
//! every compiled script; the member set is fixed at construction and no
//! script can request a narrower or different subset. What a script can
//! actually *do* with these members is decided by the evaluator's named
//! builtin set, which is the auditable trust boundary.
//!
//! The HTTP transport, authentication store, alert surface, map helper,
//! and text formatting helpers are external collaborators: this crate
//! defines their entry-point contracts and never implements them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::store::TrackerStore;

/// Backend HTTP transport.
///
/// The single consumed contract: a GET with optional query parameters that
/// resolves to the response body as JSON and rejects on non-success. The
/// transport owns connection handling, base URLs, and credentials.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a GET request and returns the parsed response body.
    async fn get(&self, path: &str, params: &[(String, String)]) -> anyhow::Result<Value>;
}

/// Read-only accessor for the current authenticated session.
pub trait AuthSession: Send + Sync {
    /// Returns the current session as an opaque record (user, token scope,
    /// whatever the authentication store exposes).
    fn session(&self) -> Value;
}

/// Fire-and-forget UI notification triggers.
///
/// No return value is consumed by this core; the UI layer owns rendering.
pub trait AlertSink: Send + Sync {
    /// Shows a transient alert.
    fn alert(&self, message: &str);
    /// Shows a blocking modal.
    fn modal(&self, message: &str);
}

/// Opaque map/geocoding helper passed through to scripts unchanged.
pub trait MapHelper: Send + Sync {
    /// Resolves a script-supplied value (address, coordinates) to whatever
    /// the host's map integration produces (typically a link or marker ref).
    fn resolve(&self, value: &Value) -> Value;
}

/// The four pure formatting helpers.
///
/// All synchronous and side-effect free; injected by the host, never
/// reimplemented here.
pub trait TextFormatters: Send + Sync {
    /// Locale-aware numeric parsing.
    fn parse_number(&self, value: &str) -> Option<f64>;
    /// HTML-escapes a string.
    fn escape_html(&self, s: &str) -> String;
    /// Converts newlines to line-break markup.
    fn nl2br(&self, s: &str) -> String;
    /// Converts bare URLs in a string into links.
    fn auto_link(&self, s: &str) -> String;
}

/// Chrono-backed date/time entry points exposed to scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTools;

impl DateTools {
    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Parses a script value into a timestamp.
    ///
    /// Accepts RFC 3339 strings and numeric Unix timestamps (seconds).
    #[must_use]
    pub fn parse(&self, value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => {
                let secs = n.as_i64()?;
                Utc.timestamp_opt(secs, 0).single()
            }
            _ => None,
        }
    }

    /// Formats a script value with a strftime-style format string.
    #[must_use]
    pub fn format(&self, value: &Value, fmt: &str) -> Option<String> {
        self.parse(value).map(|dt| dt.format(fmt).to_string())
    }
}

/// The fixed, process-wide set of host services exposed to compiled scripts.
///
/// Scripts never see this struct; the evaluator dispatches their builtin
/// calls against it. All-or-nothing by design: any script that compiles
/// at all runs against the entire set.
#[derive(Clone)]
pub struct CapabilityContext {
    /// Backend HTTP transport.
    pub http: Arc<dyn HttpClient>,
    /// Current-session accessor.
    pub auth: Arc<dyn AuthSession>,
    /// Tracker store accessor.
    pub store: Arc<TrackerStore>,
    /// Alert/modal triggers.
    pub alerts: Arc<dyn AlertSink>,
    /// Map/geocoding helper.
    pub map: Arc<dyn MapHelper>,
    /// Text formatting helpers.
    pub fmt: Arc<dyn TextFormatters>,
    /// Date/time entry points.
    pub dates: DateTools,
    /// Host platform discriminator handed to scripts as `target`.
    pub target: String,
    /// Runtime handle for fire-and-forget work scripts start.
    ///
    /// None when the context is assembled outside a tokio runtime; script
    /// `http_get` calls then log a warning and evaluate to null.
    runtime: Option<tokio::runtime::Handle>,
}

impl CapabilityContext {
    /// Assembles the capability context.
    ///
    /// Captures the ambient tokio runtime handle, if any, for work started
    /// by scripts.
    pub fn new(
        http: Arc<dyn HttpClient>,
        auth: Arc<dyn AuthSession>,
        store: Arc<TrackerStore>,
        alerts: Arc<dyn AlertSink>,
        map: Arc<dyn MapHelper>,
        fmt: Arc<dyn TextFormatters>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth,
            store,
            alerts,
            map,
            fmt,
            dates: DateTools,
            target: target.into(),
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    /// Starts a backend GET on behalf of a script, fire-and-forget.
    ///
    /// The response is dropped; scripts cannot await. A caller that needs
    /// the result must fetch it through the store surface instead.
    pub fn spawn_get(&self, path: String) {
        let Some(handle) = &self.runtime else {
            tracing::warn!(path = %path, "script http_get dropped: no runtime available");
            return;
        };
        let http = Arc::clone(&self.http);
        handle.spawn(async move {
            if let Err(err) = http.get(&path, &[]).await {
                tracing::debug!(path = %path, error = %err, "script-started request failed");
            }
        });
    }
}

impl std::fmt::Debug for CapabilityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityContext")
            .field("target", &self.target)
            .field("has_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}
