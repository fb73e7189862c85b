//! Tracker store: cached meta/project/filter state and issue queries.
//!
//! An explicit, context-passed store object (nothing process-global).
//! `meta`, `project`, and `filter` are independently settable, always
//! overwritten wholesale, and live for the process lifetime; there is no
//! expiry, no automatic refresh, and no teardown.
//!
//! Meta loads are serialized by a monotonic sequence token: every `load`
//! call takes a token before issuing its request, and a completion only
//! installs its payload if no later-issued call has installed first. A
//! stale in-flight response is discarded (logged at debug) instead of
//! silently overwriting newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::capability::HttpClient;
use crate::config::Config;
use crate::error::{NotFoundKind, PreconditionKind, TrackerError};
use crate::models::{DetailIssue, FilterWithLabel, IssuePage, Meta, Project};

/// Reserved filter value the backend interprets as a free-text search.
pub const SEARCH_FILTER: &str = "#search";

#[derive(Default)]
struct StoreState {
    meta: Option<Meta>,
    project: Option<Project>,
    filter: Option<String>,
    /// Token of the `load` call whose payload is currently installed.
    installed_load: u64,
}

/// Process-lifetime cache of tracker state plus issue query operations.
pub struct TrackerStore {
    http: Arc<dyn HttpClient>,
    base_path: String,
    page_size: u64,
    state: RwLock<StoreState>,
    load_seq: AtomicU64,
}

impl TrackerStore {
    /// Creates a store over the given backend transport.
    pub fn new(http: Arc<dyn HttpClient>, config: &Config) -> Self {
        Self {
            http,
            base_path: config.backend.base_path.clone(),
            page_size: config.query.page_size,
            state: RwLock::new(StoreState::default()),
            load_seq: AtomicU64::new(0),
        }
    }

    fn path(&self, tail: &str) -> String {
        format!("{}/{}", self.base_path, tail)
    }

    // ------------------------------------------------------------------
    // Reactive state surface
    // ------------------------------------------------------------------

    /// Returns the currently loaded meta, if any.
    #[must_use]
    pub fn meta(&self) -> Option<Meta> {
        self.state.read().expect("store lock poisoned").meta.clone()
    }

    /// Returns the currently selected project, if any.
    #[must_use]
    pub fn project(&self) -> Option<Project> {
        self.state
            .read()
            .expect("store lock poisoned")
            .project
            .clone()
    }

    /// Returns the currently selected filter name, if any.
    #[must_use]
    pub fn filter(&self) -> Option<String> {
        self.state
            .read()
            .expect("store lock poisoned")
            .filter
            .clone()
    }

    /// Replaces the selected project wholesale.
    pub fn set_project(&self, project: Option<Project>) {
        self.state.write().expect("store lock poisoned").project = project;
    }

    /// Replaces the selected filter name wholesale.
    pub fn set_filter(&self, filter: Option<String>) {
        self.state.write().expect("store lock poisoned").filter = filter;
    }

    /// Replaces meta wholesale, bypassing the backend.
    ///
    /// Also advances the load sequence so an in-flight `load` that started
    /// earlier cannot overwrite this assignment.
    pub fn set_meta(&self, meta: Option<Meta>) {
        let token = self.load_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.write().expect("store lock poisoned");
        state.meta = meta;
        state.installed_load = token;
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Loads meta wholesale from the backend.
    ///
    /// Concurrent calls still race on the network, but the sequence token
    /// guarantees the latest-issued call's payload ends up installed: a
    /// slower response from an earlier call is discarded on arrival.
    pub async fn load(&self) -> Result<(), TrackerError> {
        let token = self.load_seq.fetch_add(1, Ordering::Relaxed) + 1;

        let response = self
            .http
            .get(&self.path("tt"), &[])
            .await
            .map_err(TrackerError::Backend)?;

        let meta: Meta = extract(&response, "meta")?;

        let mut state = self.state.write().expect("store lock poisoned");
        if token > state.installed_load {
            state.installed_load = token;
            state.meta = Some(meta);
            debug!(token, "meta installed");
        } else {
            debug!(
                token,
                installed = state.installed_load,
                "stale meta response discarded"
            );
        }
        Ok(())
    }

    /// Finds the project with the given acronym in the loaded meta.
    pub fn project_by_acronym(&self, acronym: &str) -> Result<Project, TrackerError> {
        let state = self.state.read().expect("store lock poisoned");
        state
            .meta
            .as_ref()
            .and_then(|meta| meta.projects.iter().find(|p| p.acronym == acronym))
            .cloned()
            .ok_or_else(|| {
                TrackerError::NotFound(NotFoundKind::Project {
                    acronym: Some(acronym.to_string()),
                })
            })
    }

    /// Resolves a filter name to its merged [`FilterWithLabel`].
    ///
    /// The project comes from the explicit argument, else the store's
    /// current project. Both the structural filter in that project and the
    /// label entry in meta must exist; absence of either is NotFound, never
    /// a partial result.
    pub fn filter_with_label(
        &self,
        filter_name: &str,
        project: Option<&Project>,
    ) -> Result<FilterWithLabel, TrackerError> {
        let state = self.state.read().expect("store lock poisoned");
        let current = match project {
            Some(p) => p.clone(),
            None => state
                .project
                .clone()
                .ok_or(TrackerError::NotFound(NotFoundKind::Project {
                    acronym: None,
                }))?,
        };

        let not_found = || {
            TrackerError::NotFound(NotFoundKind::Filter {
                name: filter_name.to_string(),
            })
        };
        let filter = current.filter(filter_name).ok_or_else(not_found)?;
        let label = state
            .meta
            .as_ref()
            .and_then(|meta| meta.filter_label(filter_name))
            .ok_or_else(not_found)?;

        Ok(FilterWithLabel::merge(filter, label))
    }

    /// Fetches one page of issues for the current project.
    ///
    /// Rejects with [`TrackerError::PreconditionRejected`] before issuing
    /// any request when no project is set or `filter_name` is empty. When
    /// `search` is given, the effective filter sent to the backend is the
    /// reserved [`SEARCH_FILTER`] sentinel regardless of `filter_name`.
    /// Backend failures are forwarded unchanged.
    pub async fn issues(
        &self,
        limit: u64,
        filter_name: &str,
        skip: u64,
        search: Option<&str>,
    ) -> Result<IssuePage, TrackerError> {
        let acronym = self
            .project()
            .map(|p| p.acronym)
            .ok_or(TrackerError::PreconditionRejected(
                PreconditionKind::ProjectUnset,
            ))?;
        if filter_name.is_empty() {
            return Err(TrackerError::PreconditionRejected(
                PreconditionKind::FilterEmpty,
            ));
        }

        let mut params = vec![
            ("project".to_string(), acronym),
            ("filter".to_string(), filter_name.to_string()),
            ("skip".to_string(), skip.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(term) = search {
            params[1].1 = SEARCH_FILTER.to_string();
            params.push(("search".to_string(), term.to_string()));
        }

        let response = self
            .http
            .get(&self.path("issues"), &params)
            .await
            .map_err(TrackerError::Backend)?;

        extract(&response, "issues")
    }

    /// Fetches one page of issues using the configured default page size.
    pub async fn issues_page(
        &self,
        filter_name: &str,
        skip: u64,
        search: Option<&str>,
    ) -> Result<IssuePage, TrackerError> {
        self.issues(self.page_size, filter_name, skip, search).await
    }

    /// Fetches a single issue in detail form.
    ///
    /// Backend failures are forwarded unchanged.
    pub async fn issue(&self, issue_id: &str) -> Result<DetailIssue, TrackerError> {
        let response = self
            .http
            .get(&self.path(&format!("issue/{issue_id}")), &[])
            .await
            .map_err(TrackerError::Backend)?;

        extract(&response, "issue")
    }
}

/// Pulls a typed field out of a backend response envelope.
fn extract<T: serde::de::DeserializeOwned>(
    response: &Value,
    key: &str,
) -> Result<T, TrackerError> {
    let field = response.get(key).ok_or_else(|| {
        TrackerError::Backend(anyhow::anyhow!("response missing '{key}' field"))
    })?;
    serde_json::from_value(field.clone()).map_err(|err| {
        TrackerError::Backend(
            anyhow::Error::new(err).context(format!("malformed '{key}' field in response")),
        )
    })
}
