//! Issue Tracker Client Core
//!
//! This library provides the client-side core of an issue-tracking UI:
//! compiling administrator-authored per-field viewer scripts against a
//! fixed capability context, and caching tracker metadata/project/filter
//! state while serving paginated issue queries.

// Module declarations
pub mod capability;
pub mod config;
pub mod error;
pub mod models;
pub mod script;
pub mod store;
pub mod viewer;

pub use capability::CapabilityContext;
pub use config::Config;
pub use error::{ScriptError, TrackerError};
pub use store::TrackerStore;
pub use viewer::{Viewer, ViewerRegistry};
