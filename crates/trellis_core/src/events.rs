//! Event hub
//!
//! Named publish/subscribe used for every component notification. Listeners
//! registered under [`WILDCARD`] observe all emissions and receive the event
//! name as their first argument.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::{json, Value};
//! use trellis_core::events::EventHub;
//!
//! let hub = EventHub::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let _ = hub.on("*", Rc::new(move |args: &[Value]| sink.borrow_mut().push(args.to_vec())));
//!
//! hub.emit("hello", &[json!(1), json!(2)]);
//! assert_eq!(seen.borrow()[0], vec![json!("hello"), json!(1), json!(2)]);
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;

/// Event name matching every emission
pub const WILDCARD: &str = "*";

/// Listener callback
pub type Listener = Rc<dyn Fn(&[Value])>;

struct Entry {
    id: u64,
    listener: Listener,
    once: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    events: FxHashMap<String, SmallVec<[Entry; 2]>>,
}

impl Registry {
    fn insert(&mut self, name: &str, listener: Listener, once: bool) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.events
            .entry(name.to_string())
            .or_default()
            .push(Entry { id, listener, once });
        id
    }

    fn remove_id(&mut self, name: &str, id: u64) -> bool {
        let Some(entries) = self.events.get_mut(name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.events.remove(name);
        }
        removed
    }

    /// Listeners to invoke for `name`; one-shot entries are dropped here so
    /// re-entrant emits cannot fire them twice.
    fn take_snapshot(&mut self, name: &str) -> SmallVec<[Listener; 4]> {
        let Some(entries) = self.events.get_mut(name) else {
            return SmallVec::new();
        };
        let snapshot = entries.iter().map(|e| e.listener.clone()).collect();
        entries.retain(|e| !e.once);
        if entries.is_empty() {
            self.events.remove(name);
        }
        snapshot
    }
}

/// Synchronous publish/subscribe hub
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Rc<RefCell<Registry>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `name` (or [`WILDCARD`])
    pub fn on(&self, name: &str, listener: Listener) -> Subscription {
        let id = self.registry.borrow_mut().insert(name, listener, false);
        self.subscription(name, id)
    }

    /// Register a listener removed before its first invocation
    pub fn once(&self, name: &str, listener: Listener) -> Subscription {
        let id = self.registry.borrow_mut().insert(name, listener, true);
        self.subscription(name, id)
    }

    /// Remove listeners
    ///
    /// - `off(None, _)` clears every event, wildcard included
    /// - `off(Some(name), None)` clears one event name
    /// - `off(Some(name), Some(listener))` removes entries registered with
    ///   that exact listener, whether through `on` or `once`
    pub fn off(&self, name: Option<&str>, listener: Option<&Listener>) {
        let mut registry = self.registry.borrow_mut();
        match (name, listener) {
            (None, _) => registry.events.clear(),
            (Some(name), None) => {
                registry.events.remove(name);
            }
            (Some(name), Some(listener)) => {
                if let Some(entries) = registry.events.get_mut(name) {
                    entries.retain(|e| !Rc::ptr_eq(&e.listener, listener));
                    if entries.is_empty() {
                        registry.events.remove(name);
                    }
                }
            }
        }
    }

    /// Dispatch `args` to the listeners of `name`, then to wildcard listeners
    ///
    /// Emitting [`WILDCARD`] itself reaches only the wildcard listeners.
    pub fn emit(&self, name: &str, args: &[Value]) {
        let (named, wildcard) = {
            let mut registry = self.registry.borrow_mut();
            let named = if name == WILDCARD {
                SmallVec::new()
            } else {
                registry.take_snapshot(name)
            };
            (named, registry.take_snapshot(WILDCARD))
        };

        for listener in &named {
            listener(args);
        }

        if !wildcard.is_empty() {
            let mut forwarded = Vec::with_capacity(args.len() + 1);
            forwarded.push(Value::String(name.to_string()));
            forwarded.extend_from_slice(args);
            for listener in &wildcard {
                listener(&forwarded);
            }
        }
    }

    /// Number of listeners registered under `name`
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry
            .borrow()
            .events
            .get(name)
            .map_or(0, |entries| entries.len())
    }

    /// Check if no listener is registered at all
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().events.is_empty()
    }

    fn subscription(&self, name: &str, id: u64) -> Subscription {
        Subscription {
            registry: Rc::downgrade(&self.registry),
            event: name.to_string(),
            id,
        }
    }
}

/// Handle returned by every subscribe call
///
/// Dropping a `Subscription` keeps the listener registered; call
/// [`Subscription::unsubscribe`] or convert it with [`Subscription::guard`].
#[must_use = "keep the handle to unsubscribe later, or drop it explicitly"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Event name this subscription listens to
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Whether the listener is still registered
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .borrow()
                .events
                .get(&self.event)
                .is_some_and(|entries| entries.iter().any(|e| e.id == self.id))
        })
    }

    /// Remove the listener; returns false if it was already gone
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.borrow_mut().remove_id(&self.event, self.id),
            None => false,
        }
    }

    /// Scope the subscription: the listener is removed when the guard drops
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard(Some(self))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

/// Unsubscribes on drop
pub struct SubscriptionGuard(Option<Subscription>);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.0.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<Vec<Value>>>>, Listener) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let listener: Listener = Rc::new(move |args: &[Value]| sink.borrow_mut().push(args.to_vec()));
        (calls, listener)
    }

    #[test]
    fn test_emit_in_registration_order() {
        let hub = EventHub::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            let _ = hub.on("tick", Rc::new(move |_: &[Value]| order.borrow_mut().push(n)));
        }
        hub.emit("tick", &[]);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_wildcard_receives_event_name() {
        let hub = EventHub::new();
        let (calls, listener) = recorder();
        let _ = hub.on(WILDCARD, listener);

        hub.emit("hello", &[json!(1), json!(2)]);
        assert_eq!(*calls.borrow(), vec![vec![json!("hello"), json!(1), json!(2)]]);
    }

    #[test]
    fn test_emitting_wildcard_skips_named_dispatch() {
        let hub = EventHub::new();
        let (wild, wild_listener) = recorder();
        let _ = hub.on(WILDCARD, wild_listener);

        hub.emit(WILDCARD, &[json!("x")]);
        // Wildcard listeners are not invoked as a named channel, only forwarded
        assert_eq!(*wild.borrow(), vec![vec![json!("*"), json!("x")]]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let hub = EventHub::new();
        let (calls, listener) = recorder();
        let _ = hub.once("ping", listener);

        hub.emit("ping", &[json!(1)]);
        hub.emit("ping", &[json!(2)]);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(hub.listener_count("ping"), 0);
    }

    #[test]
    fn test_off_removes_once_by_original_listener() {
        let hub = EventHub::new();
        let (calls, listener) = recorder();
        let _ = hub.once("ping", listener.clone());

        hub.off(Some("ping"), Some(&listener));
        hub.emit("ping", &[]);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_off_variants() {
        let hub = EventHub::new();
        let (a_calls, a) = recorder();
        let (b_calls, b) = recorder();
        let _ = hub.on("a", a.clone());
        let _ = hub.on("a", b.clone());
        let _ = hub.on("b", b.clone());
        let _ = hub.on(WILDCARD, a.clone());

        hub.off(Some("a"), Some(&a));
        hub.emit("a", &[]);
        assert_eq!(b_calls.borrow().len(), 1);
        // only the wildcard copy of `a` fired
        assert_eq!(a_calls.borrow().len(), 1);

        hub.off(Some("b"), None);
        assert_eq!(hub.listener_count("b"), 0);
        assert_eq!(hub.listener_count("a"), 1);

        hub.off(None, None);
        assert!(hub.is_empty());
        hub.emit("a", &[]);
        assert_eq!(a_calls.borrow().len(), 1);
    }

    #[test]
    fn test_subscription_handles() {
        let hub = EventHub::new();
        let (calls, listener) = recorder();

        let sub = hub.on("x", listener.clone());
        assert!(sub.is_active());
        assert!(sub.unsubscribe());
        hub.emit("x", &[]);
        assert!(calls.borrow().is_empty());

        {
            let _guard = hub.on("x", listener).guard();
            hub.emit("x", &[]);
        }
        hub.emit("x", &[]);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_reentrant_subscribe_during_emit() {
        let hub = EventHub::new();
        let (calls, listener) = recorder();
        let inner_hub = hub.clone();
        let _ = hub.on(
            "outer",
            Rc::new(move |_: &[Value]| {
                let _ = inner_hub.on("outer", listener.clone());
                inner_hub.emit("inner", &[]);
            }),
        );

        hub.emit("outer", &[]);
        // the listener added mid-emit is not part of the running snapshot
        assert!(calls.borrow().is_empty());
        hub.emit("outer", &[]);
        assert_eq!(calls.borrow().len(), 1);
    }
}
