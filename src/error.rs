//! Error taxonomy for the tracker core.
//!
//! Four failure classes cross the public surface: lookup misses, queries
//! rejected before any request is sent, backend failures forwarded unchanged,
//! and viewer script failures. Nothing in this crate swallows an error and
//! nothing retries; retry policy belongs to the caller.

use std::fmt;

/// Errors produced by the tracker store.
#[derive(Debug)]
pub enum TrackerError {
    /// A project or filter lookup missed.
    NotFound(NotFoundKind),
    /// A query was attempted without required store state and was rejected
    /// before any request was issued.
    PreconditionRejected(PreconditionKind),
    /// A backend call failed; the original error is forwarded unchanged.
    Backend(anyhow::Error),
}

/// What a [`TrackerError::NotFound`] failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundKind {
    /// No loaded meta, or no project with the requested acronym.
    Project {
        /// The acronym that was looked up, if any was given.
        acronym: Option<String>,
    },
    /// The project has no filter with the requested name, or meta carries
    /// no label for it.
    Filter {
        /// The filter name that was looked up.
        name: String,
    },
}

/// Which precondition a rejected query was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionKind {
    /// No current project is set on the store.
    ProjectUnset,
    /// The filter argument was empty.
    FilterEmpty,
}

impl TrackerError {
    /// Returns true if this is a lookup miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the operation was rejected before any request.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionRejected(_))
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(NotFoundKind::Project { acronym: Some(a) }) => {
                write!(f, "Project not found: {a}")
            }
            Self::NotFound(NotFoundKind::Project { acronym: None }) => {
                write!(f, "Project not found")
            }
            Self::NotFound(NotFoundKind::Filter { name }) => {
                write!(f, "Filter not found: {name}")
            }
            Self::PreconditionRejected(PreconditionKind::ProjectUnset) => {
                write!(f, "No project selected")
            }
            Self::PreconditionRejected(PreconditionKind::FilterEmpty) => {
                write!(f, "No filter given")
            }
            Self::Backend(err) => write!(f, "Backend request failed: {err}"),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// A viewer script failure, raised either by the lazy compile on first
/// invocation or by the evaluator at runtime. The registry never catches
/// these; they propagate to whoever invoked the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// What stage of execution failed.
    pub kind: ScriptErrorKind,
    /// Human-readable description of the failure.
    pub message: String,
    /// Byte offset into the script source, when known.
    pub offset: Option<usize>,
}

/// Stage of script execution that produced a [`ScriptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// The source text failed to tokenize.
    Lex,
    /// The token stream failed to parse.
    Parse,
    /// The script faulted while evaluating.
    Eval,
}

impl ScriptError {
    /// Creates a new script error without source position.
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
        }
    }

    /// Attaches a byte offset into the script source.
    #[must_use]
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.kind {
            ScriptErrorKind::Lex => "lex error",
            ScriptErrorKind::Parse => "parse error",
            ScriptErrorKind::Eval => "eval error",
        };
        match self.offset {
            Some(off) => write!(f, "{stage} at byte {off}: {}", self.message),
            None => write!(f, "{stage}: {}", self.message),
        }
    }
}

impl std::error::Error for ScriptError {}
