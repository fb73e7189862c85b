//! Tracker metadata: projects, filters, and filter labels.
//!
//! `Meta` is the global tracker configuration delivered by the backend:
//! the list of projects and a mapping from filter name to human label.
//! Filters are structural descriptors scoped to a project; their labels
//! live separately in `Meta`, and [`FilterWithLabel`] is the merged view
//! handed to the UI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Global tracker configuration.
///
/// Loaded wholesale by `TrackerStore::load` and replaced on every load;
/// there is no partial merge and no expiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// All projects known to the tracker.
    pub projects: Vec<Project>,
    /// Filter name to human-readable label.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Meta {
    /// Looks up the human label for a filter name.
    #[must_use]
    pub fn filter_label(&self, name: &str) -> Option<&str> {
        self.filters.get(name).map(String::as_str)
    }
}

/// One tracked project, unique by acronym within [`Meta`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project key (e.g., "AB").
    pub acronym: String,
    /// Ordered list of filters scoped to this project.
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Project {
    /// Finds the structural filter with the given name, if any.
    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.filter == name)
    }
}

/// A structural filter descriptor scoped to a project.
///
/// The backend attaches arbitrary extra attributes to filters; they are
/// preserved verbatim in `extra` and carried through to the merged
/// [`FilterWithLabel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Filter name, the key into `Meta::filters` for the label.
    pub filter: String,
    /// Any additional backend-supplied attributes, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Filter {
    /// Creates a filter with just a name and no extra attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            filter: name.into(),
            extra: Map::new(),
        }
    }
}

/// A [`Filter`] merged with its human label.
///
/// Merge order matches the store contract: the filter's own fields are laid
/// over a default `{label}`, so a filter that carries its own `label`
/// attribute overrides the Meta-derived one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterWithLabel {
    /// Filter name.
    pub filter: String,
    /// Human-readable label (from the filter itself, else from Meta).
    pub label: String,
    /// Extra attributes carried over from the structural filter.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterWithLabel {
    /// Merges a structural filter with the Meta-derived label.
    ///
    /// The filter's own `label` attribute, when present, wins over
    /// `meta_label` unconditionally; a non-string own label is rendered
    /// to its JSON text. All other extra attributes pass through
    /// unchanged, so the typed `label` field and the serialized record
    /// always agree.
    #[must_use]
    pub fn merge(filter: &Filter, meta_label: &str) -> Self {
        let mut extra = filter.extra.clone();
        let label = match extra.remove("label") {
            Some(Value::String(own)) => own,
            Some(other) => other.to_string(),
            None => meta_label.to_string(),
        };
        Self {
            filter: filter.filter.clone(),
            label,
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_meta() -> Meta {
        serde_json::from_value(json!({
            "projects": [
                {"acronym": "AB", "filters": [{"filter": "open", "other": 1}]}
            ],
            "filters": {"open": "Open Issues"}
        }))
        .unwrap()
    }

    #[test]
    fn test_filter_extra_attributes_survive_roundtrip() {
        let meta = sample_meta();
        let filter = meta.projects[0].filter("open").unwrap();
        assert_eq!(filter.extra.get("other"), Some(&json!(1)));

        let back = serde_json::to_value(filter).unwrap();
        assert_eq!(back, json!({"filter": "open", "other": 1}));
    }

    #[test]
    fn test_merge_uses_meta_label() {
        let meta = sample_meta();
        let filter = meta.projects[0].filter("open").unwrap();
        let merged = FilterWithLabel::merge(filter, "Open Issues");

        assert_eq!(merged.filter, "open");
        assert_eq!(merged.label, "Open Issues");
        assert_eq!(merged.extra.get("other"), Some(&json!(1)));
    }

    #[test]
    fn test_merge_own_label_wins() {
        let filter: Filter =
            serde_json::from_value(json!({"filter": "open", "label": "Mine"})).unwrap();
        let merged = FilterWithLabel::merge(&filter, "Theirs");
        assert_eq!(merged.label, "Mine");
        assert!(merged.extra.get("label").is_none());
    }

    #[test]
    fn test_merge_non_string_own_label_wins_as_text() {
        let filter: Filter =
            serde_json::from_value(json!({"filter": "open", "label": 7})).unwrap();
        let merged = FilterWithLabel::merge(&filter, "Theirs");
        assert_eq!(merged.label, "7");
        // Typed field and serialized record agree on the winning label.
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({"filter": "open", "label": "7"})
        );
    }

    #[test]
    fn test_merge_serializes_flat() {
        let meta = sample_meta();
        let filter = meta.projects[0].filter("open").unwrap();
        let merged = FilterWithLabel::merge(filter, "Open Issues");
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({"filter": "open", "label": "Open Issues", "other": 1})
        );
    }

    #[test]
    fn test_project_filter_miss() {
        let meta = sample_meta();
        assert!(meta.projects[0].filter("closed").is_none());
    }
}
