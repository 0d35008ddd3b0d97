//! Namespace-scoped event registry with a composed reducer state tree.
//!
//! Application code registers named event handlers under hierarchical
//! namespaces. Handlers emit pure state-transition functions, tagged with
//! a derived action type, and the registry assembles — from the live set
//! of registered namespaces — a single composite reducer whose shape
//! mirrors the namespace tree. The attached store runs that reducer to
//! compute its state tree.
//!
//! ```
//! use evtree::{Events, MemoryStore, Store};
//! use serde_json::{json, Value};
//!
//! let events = Events::new();
//! let tests = events.namespace("tests").unwrap();
//! tests.init(json!({"foo": 1})).on("test", |scope, _args| {
//!     scope.reduce(|_| json!({"foo": 2}))?;
//!     Ok(Value::Null)
//! });
//!
//! let store = events.create_store(MemoryStore::new).unwrap();
//! assert_eq!(store.get_state(), json!({"tests": {"foo": 1}}));
//!
//! tests.trigger("test", &[]).unwrap();
//! assert_eq!(events.get_state().unwrap(), json!({"tests": {"foo": 2}}));
//! ```
//!
//! Everything is synchronous and single-threaded; shared structures use
//! `Rc`/`RefCell` and make no `Send`/`Sync` claims. Reducer composition
//! is a one-shot snapshot taken at store-creation time: namespaces
//! registered afterward stay inert until the store is recreated.

pub mod action;
pub mod error;
pub mod handle;
pub mod path;
pub mod reducer;
pub mod registry;
pub mod store;

pub use action::{Action, StateFn, GENERIC_EVENT};
pub use error::EventsError;
pub use handle::{BoundInstance, Handle, Scope};
pub use path::EventPath;
pub use reducer::{combine, Reducer};
pub use registry::Events;
pub use store::{MemoryStore, Store};
