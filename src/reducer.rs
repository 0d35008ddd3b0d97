//! Reducers and their combination.
//!
//! A [`Reducer`] maps `(previous slice, action)` to the next slice of the
//! state tree. `None` state means "initialize": leaves fall back to the
//! initial value captured at composition time. `None` action is the
//! initialization pass — no leaf matches it, so every default populates.
//!
//! [`combine`] mirrors the external store convention for nested state:
//! the combined reducer operates over a JSON object whose keys match the
//! child mapping, recursing to arbitrary depth.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::action::Action;
use crate::path::EventPath;

/// A reducer over one level of the state tree.
pub type Reducer = Rc<dyn Fn(Option<Value>, Option<&Action>) -> Value>;

/// Combine a mapping of child name -> reducer into one reducer over an
/// object keyed by child name. Absent slices are handed to children as
/// `None` so their own defaults apply.
pub fn combine(children: BTreeMap<String, Reducer>) -> Reducer {
    Rc::new(move |state, action| {
        let prev: Map<String, Value> = match state {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let mut next = Map::new();
        for (name, reducer) in &children {
            let slice = prev.get(name).cloned();
            next.insert(name.clone(), reducer(slice, action));
        }
        Value::Object(next)
    })
}

/// The reducer for one registered namespace leaf.
///
/// Accepts exactly the actions addressed to `path` and applies their
/// carried state function; everything else returns the slice unchanged.
/// `initial` is a snapshot taken at composition time.
pub fn leaf(path: EventPath, initial: Option<Value>) -> Reducer {
    Rc::new(move |state, action| {
        let current = match state {
            Some(value) => value,
            None => initial.clone().unwrap_or(Value::Null),
        };
        match action {
            Some(action) if action.targets(&path) => action.apply(current),
            _ => current,
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
