//! Actions — the only data that crosses into the store's responsibility.
//!
//! An action carries the namespace path it targets, an optional event
//! name, and the pure state-transition function to apply at the matching
//! leaf. Matching is structural (segment-by-segment path equality), so
//! segments containing regex-style metacharacters need no escaping and
//! cannot collide with other namespaces. A string `type` rendering is
//! still available via [`Action::type_string`] for logging and
//! string-keyed middleware.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::path::EventPath;

/// Label used when an action is dispatched outside any running event.
pub const GENERIC_EVENT: &str = "$generic";

/// The pure state-transition function an action carries.
pub type StateFn = Rc<dyn Fn(Value) -> Value>;

/// A dispatched state transition, addressed to one namespace.
#[derive(Clone)]
pub struct Action {
    path: EventPath,
    event: Option<String>,
    apply: StateFn,
}

impl Action {
    /// Build an action targeting `path`. `event` of `None` renders as
    /// the `$generic` label in the wire type string.
    pub fn new(path: EventPath, event: Option<String>, apply: StateFn) -> Self {
        Action { path, event, apply }
    }

    /// The namespace path this action is addressed to.
    pub fn path(&self) -> &EventPath {
        &self.path
    }

    /// The event name, if one was active or given explicitly.
    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// True iff this action is addressed to exactly `path`.
    ///
    /// Sibling namespaces, prefixes, and descendant-looking-but-unrelated
    /// paths all fail the segment comparison.
    pub fn targets(&self, path: &EventPath) -> bool {
        self.path == *path
    }

    /// Apply the carried state transition.
    pub fn apply(&self, state: Value) -> Value {
        (self.apply)(state)
    }

    /// The wire type string: `event:<slashed path>:<event | $generic>`.
    pub fn type_string(&self) -> String {
        format!(
            "event:{}:{}",
            self.path.slashed(),
            self.event.as_deref().unwrap_or(GENERIC_EVENT)
        )
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("type", &self.type_string())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
