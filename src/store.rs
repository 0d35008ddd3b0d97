//! The external-store boundary.
//!
//! The registry only ever talks to a store through the [`Store`] trait:
//! dispatch an [`Action`], read the current state tree. [`MemoryStore`]
//! is the bundled synchronous implementation — a composed reducer folded
//! over a cell — used by the docs and tests; consumers may implement
//! `Store` over anything with the same contract.

use std::cell::RefCell;

use log::debug;
use serde_json::Value;

use crate::action::Action;
use crate::reducer::Reducer;

/// What the registry requires of an attached store.
pub trait Store {
    /// Synchronously apply an action to the state tree.
    fn dispatch(&self, action: Action);

    /// The current state tree.
    fn get_state(&self) -> Value;
}

/// A minimal in-memory store: the composed reducer plus the current state.
///
/// Construction runs the reducer's initialization pass (no previous
/// state, no action), which populates every namespace's initial value.
pub struct MemoryStore {
    reducer: Reducer,
    state: RefCell<Value>,
}

impl MemoryStore {
    /// Create a store around a composed reducer.
    pub fn new(reducer: Reducer) -> Self {
        let state = reducer(None, None);
        MemoryStore {
            reducer,
            state: RefCell::new(state),
        }
    }
}

impl Store for MemoryStore {
    fn dispatch(&self, action: Action) {
        debug!("dispatch {}", action.type_string());
        let prev = self.state.borrow().clone();
        let next = (self.reducer)(Some(prev), Some(&action));
        *self.state.borrow_mut() = next;
    }

    fn get_state(&self) -> Value {
        self.state.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
