//! Wrap Options
//!
//! Knobs that control how a target is wrapped and how notification passes
//! behave. Every field has a default, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};

/// Options applied when wrapping a target.
///
/// # Example
///
/// ```rust,ignore
/// let options = WrapOptions::default()
///     .wrap_lists(false)
///     .max_notify_depth(Some(8));
/// let state = wrap_json_with(json!({ "a": 1 }), options)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapOptions {
    /// Wrap nested records when the target is wrapped.
    ///
    /// When disabled, nested records are stored detached and writes inside
    /// them are not observed.
    pub deep: bool,

    /// Wrap lists present at wrap time as index-keyed records.
    pub wrap_lists: bool,

    /// Upper bound on nested notification passes per registry.
    ///
    /// A subscriber that writes to the record it observes re-enters the
    /// notification path. With `None` that recursion is unbounded. With
    /// `Some(n)`, a write made while `n` passes are already running on the
    /// same thread still stores its value but does not notify. Passes on
    /// other threads are counted separately.
    pub max_notify_depth: Option<usize>,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            deep: true,
            wrap_lists: true,
            max_notify_depth: None,
        }
    }
}

impl WrapOptions {
    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn wrap_lists(mut self, wrap_lists: bool) -> Self {
        self.wrap_lists = wrap_lists;
        self
    }

    pub fn max_notify_depth(mut self, depth: Option<usize>) -> Self {
        self.max_notify_depth = depth;
        self
    }

    /// Parse options from a JSON document. Missing fields take their
    /// default value.
    pub fn from_json_str(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }
}
