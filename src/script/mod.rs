//! The viewer script language: lexer, parser, and evaluator.
//!
//! Administrators author small per-field scripts that compute a display
//! value from `(value, issue, field)`. A script is a statement sequence:
//!
//! ```text
//! // humanize a status field
//! let label = filter_label(value);
//! if (label) { return label }
//! return escape_html(str(value))
//! ```
//!
//! The fixed scope a script runs in:
//!
//! | name     | meaning                                             |
//! |----------|-----------------------------------------------------|
//! | `value`  | the field's raw value                               |
//! | `issue`  | the whole issue record                              |
//! | `field`  | the field name being rendered                       |
//! | `target` | host platform discriminator (constant, e.g. "pwa")  |
//! | `filter` | always null in the current composition              |
//!
//! Host access goes through named builtins only (see `eval`); the rest of
//! the process is unreachable from script code.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use parser::Program;

use crate::error::ScriptError;

/// Compiles script source into a runnable [`Program`].
///
/// Called lazily by the viewer registry on a viewer's first invocation,
/// never at registration time.
pub fn compile(source: &str) -> Result<Program, ScriptError> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(tokens)
}

/// Builds a JSON number from a script-level f64, preserving integrality.
///
/// Integral finite values become i64 numbers so display forms read `12`,
/// not `12.0`; everything else stays f64. Returns None for non-finite
/// input.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn json_number(n: f64) -> Option<serde_json::Value> {
    if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
        return Some(serde_json::Value::Number(serde_json::Number::from(n as i64)));
    }
    serde_json::Number::from_f64(n).map(serde_json::Value::Number)
}
