//! Viewer registry: code-keyed compilation cache for field renderers.
//!
//! `get_viewer` never compiles. It hands back a [`Viewer`] wrapper that
//! compiles the code on its first invocation; a malformed script therefore
//! fails when first invoked, never at registration, and the failure is
//! replayed on every later invocation rather than recovered.
//!
//! Repeated `get_viewer` calls with the same code return behaviorally
//! equivalent viewers sharing one cached compilation; each call creates a
//! fresh wrapper, so reference identity between them is not guaranteed.
//! Compiled entries live in a bounded least-recently-requested cache keyed
//! by the exact code string.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use serde_json::Value;
use tracing::debug;

use crate::capability::CapabilityContext;
use crate::error::ScriptError;
use crate::models::Issue;
use crate::script::{self, eval, Program};

/// One cache slot: source text plus its lazily computed compilation.
struct CachedViewer {
    code: String,
    compiled: OnceLock<Result<Arc<Program>, ScriptError>>,
}

impl CachedViewer {
    fn compile(&self) -> Result<Arc<Program>, ScriptError> {
        self.compiled
            .get_or_init(|| script::compile(&self.code).map(Arc::new))
            .clone()
    }
}

/// A callable field renderer with the public `(value, issue, field)`
/// signature.
///
/// Invocation is synchronous; any asynchronous work the script starts
/// through its builtins is fire-and-forget and never awaited here.
#[derive(Clone)]
pub struct Viewer {
    cached: Arc<CachedViewer>,
    ctx: CapabilityContext,
}

impl Viewer {
    /// Renders one field of one issue.
    ///
    /// The first invocation compiles the script; compile and runtime
    /// faults alike surface as [`ScriptError`] and are never caught
    /// internally.
    pub fn invoke(
        &self,
        value: Value,
        issue: &Issue,
        field: &str,
    ) -> Result<Value, ScriptError> {
        let program = self.cached.compile()?;
        eval::run(&program, &self.ctx, value, issue.to_value(), field)
    }

    /// The source code this viewer was created from.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.cached.code
    }
}

/// Maps code strings to compiled render functions, caching by code.
pub struct ViewerRegistry {
    ctx: CapabilityContext,
    cache: Mutex<LruCache>,
}

impl ViewerRegistry {
    /// Creates a registry over the given capability context.
    ///
    /// `capacity` bounds the number of retained compilations and must be
    /// at least 1 (enforced by config validation upstream).
    #[must_use]
    pub fn new(ctx: CapabilityContext, capacity: usize) -> Self {
        Self {
            ctx,
            cache: Mutex::new(LruCache::new(capacity.max(1))),
        }
    }

    /// Returns a viewer for the given code string.
    ///
    /// Always succeeds; compilation is deferred to the viewer's first
    /// invocation. The compilation (or its failure) is shared by every
    /// viewer handed out for this code while it stays cached.
    #[must_use]
    pub fn get_viewer(&self, code: &str) -> Viewer {
        let mut cache = self.cache.lock().expect("viewer cache lock poisoned");
        let cached = cache.get_or_insert(code);
        Viewer {
            cached,
            ctx: self.ctx.clone(),
        }
    }

    /// Number of compilations currently retained.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.lock().expect("viewer cache lock poisoned").len()
    }
}

/// Small least-recently-requested cache; capacity is tens of entries, so
/// linear recency bookkeeping is fine.
struct LruCache {
    capacity: usize,
    entries: HashMap<String, Arc<CachedViewer>>,
    recency: VecDeque<String>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, code: &str) {
        if let Some(pos) = self.recency.iter().position(|c| c == code) {
            self.recency.remove(pos);
        }
        self.recency.push_back(code.to_string());
    }

    fn get_or_insert(&mut self, code: &str) -> Arc<CachedViewer> {
        if let Some(existing) = self.entries.get(code) {
            let existing = Arc::clone(existing);
            self.touch(code);
            return existing;
        }

        let entry = Arc::new(CachedViewer {
            code: code.to_string(),
            compiled: OnceLock::new(),
        });
        self.entries.insert(code.to_string(), Arc::clone(&entry));
        self.touch(code);

        while self.entries.len() > self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(code = %oldest, "evicted compiled viewer");
        }

        entry
    }
}
