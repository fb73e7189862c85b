//! Data structures for tracker metadata and issues.

pub mod issue;
pub mod meta;

pub use issue::{DetailIssue, Issue, IssuePage};
pub use meta::{Filter, FilterWithLabel, Meta, Project};
