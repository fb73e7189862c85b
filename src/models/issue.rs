//! Issue records and paginated issue listings.
//!
//! Issues are field-keyed records: the backend owns the field set, and
//! viewer scripts address fields by name. Only `id` is structural; every
//! other field rides in the open map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tracked item as it appears in a list query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Backend-assigned issue identifier.
    #[serde(default)]
    pub id: String,
    /// All remaining fields, keyed by field name.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Reads a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the whole record as a JSON value, `id` included.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A single issue in detail form, as returned by the single-record fetch.
///
/// Structurally identical to [`Issue`] today; kept as its own type because
/// the backend's detail envelope is free to diverge from the list shape.
pub type DetailIssue = Issue;

/// One page of issues plus pagination metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuePage {
    /// Issues on this page.
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Total number of issues matching the query.
    #[serde(default)]
    pub count: u64,
    /// Offset this page starts at.
    #[serde(default)]
    pub skip: u64,
    /// Page size that was requested.
    #[serde(default)]
    pub limit: u64,
}
