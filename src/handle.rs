//! Namespace handles, event handler sets, and the data binder.
//!
//! Three views share one core:
//!
//! - [`Handle`] — the long-lived object the registry resolves for a path.
//!   Adds descent (`child`), initial state (`init`), store creation and
//!   data binding on top of the shared surface.
//! - [`BoundInstance`] — an ephemeral handle rebuilt over a caller-supplied
//!   data object, produced by [`Handle::bind`] and cached per handle by
//!   shallow equality of that data.
//! - [`Scope`] — the shared capability surface both deref to, and what
//!   handlers, setup functions and mixins receive: `on`, `setup`,
//!   `apply`, `trigger`, `reduce`, `get_state`.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use log::trace;
use serde_json::{Map, Value};

use crate::action::{Action, StateFn};
use crate::error::EventsError;
use crate::path::EventPath;
use crate::reducer::Reducer;
use crate::registry::{self, RegistryShared};
use crate::store::Store;

/// A registered event handler. Receives the scope it runs on and the
/// trigger arguments.
pub(crate) type Handler = Rc<dyn Fn(&Scope, &[Value]) -> Result<Value, EventsError>>;

/// A deferred setup function, replayable against bound instances.
pub(crate) type SetupFn = Rc<dyn Fn(&Scope)>;

pub(crate) struct HandleCore {
    path: EventPath,
    registry: Rc<RegistryShared>,
    /// Handler set in registration order; re-registration replaces in place.
    handlers: RefCell<Vec<(String, Handler)>>,
    /// Deferred setup functions, in append order.
    setups: RefCell<Vec<SetupFn>>,
    /// The event presently executing on this core. A single slot, not a
    /// stack: see the caveat on [`Scope::trigger`].
    current_event: RefCell<Option<String>>,
    /// The external data object, for bound instances only.
    data: Option<Map<String, Value>>,
    /// Single-slot bound-instance cache (unbound handles only).
    bound: RefCell<Option<BoundInstance>>,
}

// ---------------------------------------------------------------------------
// Scope — the shared surface
// ---------------------------------------------------------------------------

/// The capability surface shared by handles and bound instances.
pub struct Scope(pub(crate) Rc<HandleCore>);

impl Clone for Scope {
    fn clone(&self) -> Self {
        Scope(Rc::clone(&self.0))
    }
}

impl Scope {
    /// This scope's namespace path.
    pub fn path(&self) -> &EventPath {
        &self.0.path
    }

    /// The bound data object, if this scope belongs to a bound instance.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.0.data.as_ref()
    }

    /// The name of the event presently executing on this scope, if any.
    pub fn current_event(&self) -> Option<String> {
        self.0.current_event.borrow().clone()
    }

    /// Register `handler` under `name`. Registering the same name again
    /// replaces the handler in place, keeping its original position.
    pub fn on<F>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(&Scope, &[Value]) -> Result<Value, EventsError> + 'static,
    {
        self.on_rc(name, Rc::new(handler));
        self
    }

    pub(crate) fn on_rc(&self, name: &str, handler: Handler) {
        let mut handlers = self.0.handlers.borrow_mut();
        if let Some(entry) = handlers.iter_mut().find(|(n, _)| n == name) {
            entry.1 = handler;
        } else {
            handlers.push((name.to_string(), handler));
        }
    }

    /// Append a deferred setup function and invoke it once, immediately,
    /// against this scope. The deferred copy is replayed whenever the
    /// handle is bound to a data object.
    pub fn setup<F>(&self, f: F) -> &Self
    where
        F: Fn(&Scope) + 'static,
    {
        self.setup_rc(Rc::new(f));
        self
    }

    pub(crate) fn setup_rc(&self, f: SetupFn) {
        self.0.setups.borrow_mut().push(f.clone());
        f(self);
    }

    /// Invoke a mixin immediately and unconditionally with this scope.
    /// Extra arguments ride in the closure. Mixins have no return-value
    /// contract and are not memoized.
    pub fn apply<M>(&self, mixin: M) -> &Self
    where
        M: FnOnce(&Scope),
    {
        mixin(self);
        self
    }

    /// Run the handler registered under `name`.
    ///
    /// The current-event marker is set for the duration of the call and
    /// restored on both success and failure, so a failing handler never
    /// leaves stale context behind. The marker is a single slot, not a
    /// stack: a nested `trigger` of a different event on this same scope
    /// restores correctly one level deep only.
    pub fn trigger(&self, name: &str, args: &[Value]) -> Result<Value, EventsError> {
        let handler = self
            .0
            .handlers
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| h.clone())
            .ok_or_else(|| EventsError::NoSuchHandler {
                namespace: self.0.path.dotted(),
                event: name.to_string(),
            })?;

        trace!("trigger {}:{}", self.0.path.dotted(), name);
        let prev = self.0.current_event.replace(Some(name.to_string()));
        let result = handler(self, args);
        *self.0.current_event.borrow_mut() = prev;
        result
    }

    /// Dispatch a state transition labelled with the current event (or
    /// the `$generic` label when none is executing).
    pub fn reduce<F>(&self, f: F) -> Result<(), EventsError>
    where
        F: Fn(Value) -> Value + 'static,
    {
        let event = self.current_event();
        self.dispatch(event, Rc::new(f))
    }

    /// Dispatch a state transition under an explicit event name,
    /// overriding the current-event context.
    pub fn reduce_as<F>(&self, event: &str, f: F) -> Result<(), EventsError>
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.dispatch(Some(event.to_string()), Rc::new(f))
    }

    fn dispatch(&self, event: Option<String>, apply: StateFn) -> Result<(), EventsError> {
        let store = self.0.registry.attached_store()?;
        let action = Action::new(self.0.path.clone(), event, apply);
        store.dispatch(action);
        Ok(())
    }

    /// Read this namespace's slice of the store's state tree.
    /// Absent slices read as `Value::Null`.
    pub fn get_state(&self) -> Result<Value, EventsError> {
        let store = self.0.registry.attached_store()?;
        let mut value = store.get_state();
        for segment in self.0.path.segments() {
            value = match value {
                Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
                _ => Value::Null,
            };
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// The registry-resolved object representing one namespace.
///
/// Cheap to clone; `resolve` hands out clones of the same allocation, so
/// [`Handle::ptr_eq`] witnesses identity.
pub struct Handle {
    scope: Scope,
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Handle {
            scope: self.scope.clone(),
        }
    }
}

impl Deref for Handle {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl Handle {
    pub(crate) fn new(path: EventPath, registry: Rc<RegistryShared>) -> Handle {
        Handle {
            scope: Scope(Rc::new(HandleCore {
                path,
                registry,
                handlers: RefCell::new(Vec::new()),
                setups: RefCell::new(Vec::new()),
                current_event: RefCell::new(None),
                data: None,
                bound: RefCell::new(None),
            })),
        }
    }

    /// Descend to (creating if needed) the child namespace `path.segment`.
    pub fn child(&self, segment: &str) -> Result<Handle, EventsError> {
        let path = self.scope.0.path.child(segment)?;
        Ok(registry::resolve_on(&self.scope.0.registry, &path))
    }

    /// Record the initial state for this namespace's path. Consulted by
    /// the reducer composer as the leaf's default state.
    pub fn init(&self, initial: Value) -> &Self {
        self.scope
            .0
            .registry
            .set_initial(self.scope.0.path.dotted(), initial);
        self
    }

    /// `init` plus an immediate `setup`.
    pub fn init_with<F>(&self, initial: Value, setup: F) -> &Self
    where
        F: Fn(&Scope) + 'static,
    {
        self.init(initial);
        self.scope.setup(setup);
        self
    }

    /// One-time store creation: composes the current namespace graph and
    /// invokes `factory` with the composite reducer.
    ///
    /// Fails with [`EventsError::StoreAlreadyCreated`] while a store is
    /// attached. Namespaces registered after this call are inert until
    /// the store is recreated.
    pub fn create_store<S, F>(&self, factory: F) -> Result<Rc<S>, EventsError>
    where
        S: Store + 'static,
        F: FnOnce(Reducer) -> S,
    {
        registry::create_store_on(&self.scope.0.registry, factory)
    }

    /// Bind this handle's handler definitions to an external data object.
    ///
    /// If the cached bound instance's data is shallow-equal to `data`
    /// (same keys, equal values), the cached instance is returned
    /// unchanged. Otherwise a fresh instance is built: every deferred
    /// setup function replays in order, then every directly-registered
    /// handler is copied over, and the new instance replaces the cache.
    pub fn bind(&self, data: &Map<String, Value>) -> BoundInstance {
        {
            let slot = self.scope.0.bound.borrow();
            if let Some(instance) = slot.as_ref() {
                if let Some(existing) = instance.scope.0.data.as_ref() {
                    if shallow_eq(existing, data) {
                        trace!("bind {}: cache hit", self.scope.0.path.dotted());
                        return instance.clone();
                    }
                }
            }
        }

        let instance = BoundInstance {
            scope: Scope(Rc::new(HandleCore {
                path: self.scope.0.path.clone(),
                registry: Rc::clone(&self.scope.0.registry),
                handlers: RefCell::new(Vec::new()),
                setups: RefCell::new(Vec::new()),
                current_event: RefCell::new(None),
                data: Some(data.clone()),
                bound: RefCell::new(None),
            })),
        };

        let setups: Vec<SetupFn> = self.scope.0.setups.borrow().clone();
        for setup in setups {
            instance.scope.setup_rc(setup);
        }
        let handlers: Vec<(String, Handler)> = self.scope.0.handlers.borrow().clone();
        for (name, handler) in handlers {
            instance.scope.on_rc(&name, handler);
        }

        *self.scope.0.bound.borrow_mut() = Some(instance.clone());
        instance
    }

    /// True iff both handles are the same registry allocation.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.scope.0, &other.scope.0)
    }
}

// ---------------------------------------------------------------------------
// BoundInstance
// ---------------------------------------------------------------------------

/// A handle's handler set re-materialized over a specific data object.
pub struct BoundInstance {
    scope: Scope,
}

impl Clone for BoundInstance {
    fn clone(&self) -> Self {
        BoundInstance {
            scope: self.scope.clone(),
        }
    }
}

impl Deref for BoundInstance {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl BoundInstance {
    /// The data object this instance was bound to.
    pub fn data(&self) -> &Map<String, Value> {
        self.scope
            .0
            .data
            .as_ref()
            .expect("bound instance always carries a data object")
    }

    /// True iff both refer to the same bound allocation.
    pub fn ptr_eq(&self, other: &BoundInstance) -> bool {
        Rc::ptr_eq(&self.scope.0, &other.scope.0)
    }
}

/// Same own keys, equal values — field-by-field, no recursion into what
/// equality means for nested values beyond `Value`'s own `==`.
fn shallow_eq(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Events;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn data_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    // --- on / trigger ---

    #[test]
    fn trigger_runs_handler_with_args() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.on("echo", |_scope, args| Ok(args[0].clone()));
        let result = ns.trigger("echo", &[json!("hello")]).unwrap();
        assert_eq!(result, json!("hello"));
    }

    #[test]
    fn trigger_unregistered_fails() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        match ns.trigger("nope", &[]) {
            Err(EventsError::NoSuchHandler { namespace, event }) => {
                assert_eq!(namespace, "tests");
                assert_eq!(event, "nope");
            }
            other => panic!("expected NoSuchHandler, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.on("e", |_, _| Ok(json!(1)));
        ns.on("e", |_, _| Ok(json!(2)));
        assert_eq!(ns.trigger("e", &[]).unwrap(), json!(2));
    }

    // --- current-event context ---

    #[test]
    fn context_set_during_handler_and_restored_after() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.on("save", |scope, _| {
            assert_eq!(scope.current_event().as_deref(), Some("save"));
            Ok(Value::Null)
        });
        assert_eq!(ns.current_event(), None);
        ns.trigger("save", &[]).unwrap();
        assert_eq!(ns.current_event(), None);
    }

    #[test]
    fn context_restored_on_handler_failure() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.on("boom", |_, _| Err(EventsError::handler("boom", "bad input")));
        let err = ns.trigger("boom", &[]).unwrap_err();
        assert!(matches!(err, EventsError::Handler { .. }));
        assert_eq!(ns.current_event(), None);
    }

    #[test]
    fn nested_trigger_restores_one_level() {
        // The marker is a single slot: the inner trigger restores the
        // outer event correctly, one level deep.
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.on("inner", |scope, _| {
            assert_eq!(scope.current_event().as_deref(), Some("inner"));
            Ok(Value::Null)
        });
        ns.on("outer", |scope, _| {
            scope.trigger("inner", &[])?;
            assert_eq!(scope.current_event().as_deref(), Some("outer"));
            Ok(Value::Null)
        });
        ns.trigger("outer", &[]).unwrap();
        assert_eq!(ns.current_event(), None);
    }

    // --- reduce ---

    #[test]
    fn reduce_without_store_fails() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        assert!(matches!(
            ns.reduce(|state| state),
            Err(EventsError::NoStoreAttached)
        ));
    }

    #[test]
    fn reduce_inside_handler_labels_action_with_event() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.init(json!(0)).on("bump", |scope, _| {
            scope.reduce(|state| json!(state.as_i64().unwrap_or(0) + 1))?;
            Ok(Value::Null)
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        struct Recording {
            inner: MemoryStore,
            seen: Rc<RefCell<Vec<String>>>,
        }
        impl Store for Recording {
            fn dispatch(&self, action: Action) {
                self.seen.borrow_mut().push(action.type_string());
                self.inner.dispatch(action);
            }
            fn get_state(&self) -> Value {
                self.inner.get_state()
            }
        }

        let seen2 = Rc::clone(&seen);
        events
            .create_store(move |reducer| Recording {
                inner: MemoryStore::new(reducer),
                seen: seen2,
            })
            .unwrap();

        ns.trigger("bump", &[]).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["event:tests:bump"]);
        assert_eq!(ns.get_state().unwrap(), json!(1));
    }

    #[test]
    fn reduce_outside_handler_uses_generic_label() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.init(json!({"n": 0}));

        let seen = Rc::new(RefCell::new(Vec::new()));
        struct Recording(Rc<RefCell<Vec<String>>>);
        impl Store for Recording {
            fn dispatch(&self, action: Action) {
                self.0.borrow_mut().push(action.type_string());
            }
            fn get_state(&self) -> Value {
                Value::Null
            }
        }
        let seen2 = Rc::clone(&seen);
        events.create_store(move |_| Recording(seen2)).unwrap();

        ns.reduce(|state| state).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["event:tests:$generic"]);
    }

    #[test]
    fn reduce_as_overrides_context() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        struct Recording(Rc<RefCell<Vec<String>>>);
        impl Store for Recording {
            fn dispatch(&self, action: Action) {
                self.0.borrow_mut().push(action.type_string());
            }
            fn get_state(&self) -> Value {
                Value::Null
            }
        }
        let seen2 = Rc::clone(&seen);
        events.create_store(move |_| Recording(seen2)).unwrap();

        ns.on("save", |scope, _| {
            scope.reduce_as("persisted", |state| state)?;
            Ok(Value::Null)
        });
        ns.trigger("save", &[]).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["event:tests:persisted"]);
    }

    // --- setup / mixins ---

    #[test]
    fn setup_runs_immediately() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.setup(|scope| {
            scope.on("ping", |_, _| Ok(json!("pong")));
        });
        assert_eq!(ns.trigger("ping", &[]).unwrap(), json!("pong"));
    }

    #[test]
    fn mixin_registers_handlers() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        let label = "mixed".to_string();
        ns.apply(move |scope| {
            let label = label.clone();
            scope.on("mixinEvent", move |_, _| Ok(json!(label.clone())));
        });
        assert_eq!(ns.trigger("mixinEvent", &[]).unwrap(), json!("mixed"));
    }

    #[test]
    fn init_with_forwards_to_setup() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.init_with(json!({"n": 0}), |scope| {
            scope.on("noop", |_, _| Ok(Value::Null));
        });
        assert!(ns.trigger("noop", &[]).is_ok());
        let store = events.create_store(MemoryStore::new).unwrap();
        assert_eq!(store.get_state(), json!({"tests": {"n": 0}}));
    }

    // --- data binder ---

    #[test]
    fn bind_shallow_equal_hits_cache() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        let a = ns.bind(&data_map(json!({"foo": 2})));
        let b = ns.bind(&data_map(json!({"foo": 2})));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn bind_different_data_builds_fresh_instance() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        let a = ns.bind(&data_map(json!({"foo": 2})));
        let b = ns.bind(&data_map(json!({"foo": 3})));
        assert!(!a.ptr_eq(&b));
        assert_eq!(b.data(), &data_map(json!({"foo": 3})));
    }

    #[test]
    fn bind_extra_or_missing_keys_miss_cache() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        let a = ns.bind(&data_map(json!({"foo": 2})));
        let b = ns.bind(&data_map(json!({"foo": 2, "bar": 1})));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn bind_replaces_cache_slot() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        let a = ns.bind(&data_map(json!({"foo": 2})));
        let _b = ns.bind(&data_map(json!({"foo": 3})));
        // The old record was replaced: equal-to-a data now builds fresh.
        let c = ns.bind(&data_map(json!({"foo": 2})));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn bind_replays_setups_over_fresh_data() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.setup(|scope| {
            scope.on("who", |scope, _| {
                let user = scope
                    .data()
                    .and_then(|d| d.get("user").cloned())
                    .unwrap_or(Value::Null);
                Ok(user)
            });
        });

        // Standalone (unbound) — handler exists, no data.
        assert_eq!(ns.trigger("who", &[]).unwrap(), Value::Null);

        let bound = ns.bind(&data_map(json!({"user": "ada"})));
        assert_eq!(bound.trigger("who", &[]).unwrap(), json!("ada"));

        let rebound = ns.bind(&data_map(json!({"user": "grace"})));
        assert_eq!(rebound.trigger("who", &[]).unwrap(), json!("grace"));
    }

    #[test]
    fn bind_copies_directly_registered_handlers() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.on("direct", |_, _| Ok(json!("here")));
        let bound = ns.bind(&data_map(json!({"k": 1})));
        assert_eq!(bound.trigger("direct", &[]).unwrap(), json!("here"));
    }

    #[test]
    fn bind_direct_handlers_override_setup_registrations() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.setup(|scope| {
            scope.on("e", |_, _| Ok(json!("from setup")));
        });
        ns.on("e", |_, _| Ok(json!("direct")));
        let bound = ns.bind(&data_map(json!({"k": 1})));
        assert_eq!(bound.trigger("e", &[]).unwrap(), json!("direct"));
    }

    #[test]
    fn bound_instance_dispatches_through_same_store() {
        let events = Events::new();
        let ns = events.namespace("tests").unwrap();
        ns.init(json!({"seen": null})).setup(|scope| {
            scope.on("record", |scope, _| {
                let user = scope
                    .data()
                    .and_then(|d| d.get("user").cloned())
                    .unwrap_or(Value::Null);
                scope.reduce(move |_| json!({ "seen": user.clone() }))?;
                Ok(Value::Null)
            });
        });
        events.create_store(MemoryStore::new).unwrap();

        let bound = ns.bind(&data_map(json!({"user": "ada"})));
        bound.trigger("record", &[]).unwrap();
        assert_eq!(ns.get_state().unwrap(), json!({"seen": "ada"}));
        assert_eq!(bound.get_state().unwrap(), json!({"seen": "ada"}));
    }

    // --- shallow_eq ---

    #[test]
    fn shallow_eq_semantics() {
        let a = data_map(json!({"x": 1, "y": "s"}));
        let b = data_map(json!({"y": "s", "x": 1}));
        assert!(shallow_eq(&a, &b));
        let c = data_map(json!({"x": 1}));
        assert!(!shallow_eq(&a, &c));
        let d = data_map(json!({"x": 2, "y": "s"}));
        assert!(!shallow_eq(&a, &d));
    }
}
