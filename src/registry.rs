//! The event registry — handle map, namespace graph, initial-state
//! table, and the single store slot.
//!
//! [`Events`] owns all registry state explicitly — no module-level
//! globals. Construct one per process (or per test) and reset it with
//! [`Events::clear`]. Resolution is memoizing and idempotent — the same
//! path always yields the same handle allocation.
//!
//! Reducer composition is a one-shot snapshot: the store-creating call
//! composes whatever namespace graph exists at that moment, and
//! namespaces registered afterward are inert until the store is
//! recreated. This is a deliberate contract, not an oversight.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use log::debug;
use serde_json::Value;

use crate::error::EventsError;
use crate::handle::Handle;
use crate::path::EventPath;
use crate::reducer::{combine, leaf, Reducer};
use crate::store::Store;

/// One node of the namespace graph, keyed by segment. `BTreeMap` keeps
/// composition order deterministic.
#[derive(Default)]
struct Node {
    children: BTreeMap<String, Node>,
}

pub(crate) struct RegistryShared {
    /// All resolved handles, keyed by dotted path.
    handles: RefCell<HashMap<String, Handle>>,
    /// Every path ever resolved, as a nested tree. Drives composition.
    graph: RefCell<Node>,
    /// Initial state per dotted path, consulted at composition time.
    initial: RefCell<HashMap<String, Value>>,
    /// The attached store, at most one at a time.
    store: RefCell<Option<Rc<dyn Store>>>,
}

impl RegistryShared {
    pub(crate) fn attached_store(&self) -> Result<Rc<dyn Store>, EventsError> {
        self.store.borrow().clone().ok_or(EventsError::NoStoreAttached)
    }

    pub(crate) fn set_initial(&self, key: String, value: Value) {
        self.initial.borrow_mut().insert(key, value);
    }
}

/// Resolve `path` against a shared registry: return the existing handle
/// or create one, marking every prefix present in the graph.
pub(crate) fn resolve_on(shared: &Rc<RegistryShared>, path: &EventPath) -> Handle {
    let key = path.dotted();
    {
        let handles = shared.handles.borrow();
        if let Some(handle) = handles.get(&key) {
            return handle.clone();
        }
    }

    debug!("registering namespace {}", key);
    {
        let mut graph = shared.graph.borrow_mut();
        let mut node = &mut *graph;
        for segment in path.segments() {
            node = node.children.entry(segment.clone()).or_default();
        }
    }

    let handle = Handle::new(path.clone(), Rc::clone(shared));
    shared.handles.borrow_mut().insert(key, handle.clone());
    handle
}

/// Compose the registry's current namespace graph into one reducer.
pub(crate) fn compose(shared: &RegistryShared) -> Reducer {
    let graph = shared.graph.borrow();
    let initial = shared.initial.borrow();
    let mut children: BTreeMap<String, Reducer> = BTreeMap::new();
    for (segment, node) in &graph.children {
        children.insert(
            segment.clone(),
            compose_node(node, vec![segment.clone()], &initial),
        );
    }
    combine(children)
}

fn compose_node(node: &Node, prefix: Vec<String>, initial: &HashMap<String, Value>) -> Reducer {
    if node.children.is_empty() {
        let path = EventPath::from_validated(prefix);
        let default = initial.get(&path.dotted()).cloned();
        return leaf(path, default);
    }
    let mut children: BTreeMap<String, Reducer> = BTreeMap::new();
    for (segment, child) in &node.children {
        let mut child_prefix = prefix.clone();
        child_prefix.push(segment.clone());
        children.insert(segment.clone(), compose_node(child, child_prefix, initial));
    }
    combine(children)
}

/// One-time store creation against a shared registry.
pub(crate) fn create_store_on<S, F>(
    shared: &Rc<RegistryShared>,
    factory: F,
) -> Result<Rc<S>, EventsError>
where
    S: Store + 'static,
    F: FnOnce(Reducer) -> S,
{
    if shared.store.borrow().is_some() {
        return Err(EventsError::StoreAlreadyCreated);
    }
    let reducer = compose(shared);
    debug!(
        "creating store over {} namespace(s)",
        shared.handles.borrow().len()
    );
    let store = Rc::new(factory(reducer));
    *shared.store.borrow_mut() = Some(store.clone() as Rc<dyn Store>);
    Ok(store)
}

// ---------------------------------------------------------------------------
// Events — the public registry object
// ---------------------------------------------------------------------------

/// The namespace-scoped event registry.
pub struct Events {
    shared: Rc<RegistryShared>,
}

impl Events {
    /// Create an empty registry: no namespaces, no store.
    pub fn new() -> Self {
        Events {
            shared: Rc::new(RegistryShared {
                handles: RefCell::new(HashMap::new()),
                graph: RefCell::new(Node::default()),
                initial: RefCell::new(HashMap::new()),
                store: RefCell::new(None),
            }),
        }
    }

    /// Obtain (creating if needed) the handle for `path`. Idempotent:
    /// re-resolving an existing path returns the same handle allocation.
    pub fn resolve(&self, path: &EventPath) -> Handle {
        resolve_on(&self.shared, path)
    }

    /// Root namespace accessor — descend to/create a top-level namespace.
    pub fn namespace(&self, segment: &str) -> Result<Handle, EventsError> {
        Ok(self.resolve(&EventPath::new([segment])?))
    }

    /// Attach an externally-built store. Fails while one is attached.
    pub fn attach(&self, store: Rc<dyn Store>) -> Result<(), EventsError> {
        let mut slot = self.shared.store.borrow_mut();
        if slot.is_some() {
            return Err(EventsError::StoreAlreadyCreated);
        }
        *slot = Some(store);
        Ok(())
    }

    /// Drop the attached store, if any.
    pub fn detach(&self) {
        *self.shared.store.borrow_mut() = None;
    }

    /// Reset everything: handles, graph, initial states, store.
    /// Intended for test isolation.
    pub fn clear(&self) {
        debug!("clearing registry");
        self.shared.handles.borrow_mut().clear();
        *self.shared.graph.borrow_mut() = Node::default();
        self.shared.initial.borrow_mut().clear();
        *self.shared.store.borrow_mut() = None;
    }

    /// Compose the current namespace graph into a reducer, right now.
    pub fn get_reducer(&self) -> Reducer {
        compose(&self.shared)
    }

    /// The whole store state tree.
    pub fn get_state(&self) -> Result<Value, EventsError> {
        Ok(self.shared.attached_store()?.get_state())
    }

    /// One-time store creation: composes the graph and invokes `factory`
    /// with the composite reducer, recording and returning the store.
    pub fn create_store<S, F>(&self, factory: F) -> Result<Rc<S>, EventsError>
    where
        S: Store + 'static,
        F: FnOnce(Reducer) -> S,
    {
        create_store_on(&self.shared, factory)
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
