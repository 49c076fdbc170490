//! Component declarations
//!
//! A [`Behavior`] describes one kind of component: its default options,
//! initial state, declared elements, listeners, actions and lifecycle
//! hooks. Every method has a default so implementations only spell out what
//! they need.
//!
//! ```rust
//! use std::rc::Rc;
//! use serde_json::json;
//! use trellis_core::{
//!     Behavior, Component, DomEvent, EventMethod, Handler, Runtime, Selector, State, state_from,
//! };
//!
//! struct Counter;
//!
//! impl Behavior for Counter {
//!     fn name(&self) -> &str {
//!         "Counter"
//!     }
//!
//!     fn initial_state(&self) -> State {
//!         state_from(json!({ "count": 0 }))
//!     }
//!
//!     fn selectors(&self) -> Vec<(String, Selector)> {
//!         vec![("button".into(), Selector::css("button"))]
//!     }
//!
//!     fn listeners(&self) -> Vec<(String, Handler<EventMethod>)> {
//!         vec![("click @button".into(), Handler::method("increment"))]
//!     }
//!
//!     fn event_method(&self, name: &str) -> Option<EventMethod> {
//!         match name {
//!             "increment" => Some(Rc::new(|cx: &Component, _event: &DomEvent| {
//!                 let count = cx.get_state_or("count", json!(0)).as_i64().unwrap_or(0);
//!                 cx.set_state(state_from(json!({ "count": count + 1 })));
//!             })),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let runtime = Runtime::new();
//! let doc = runtime.document().clone();
//! let root = doc.append_element(doc.body(), "div").unwrap();
//! let button = doc.append_element(root, "button").unwrap();
//!
//! let counter = Component::new(&runtime, Rc::new(Counter), Default::default());
//! counter.mount(root, Some(State::new())).unwrap();
//! doc.dispatch_event(button, "click");
//! assert_eq!(counter.get_state("count"), Some(json!(1)));
//! ```

use std::borrow::Cow;
use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};
use serde_json::Value;

use crate::component::Component;
use crate::dom::{Document, DomEvent, NodeId};
use crate::error::Result;
use crate::options::{Options, ResolvedOptions};
use crate::runtime::Runtime;
use crate::state::{default_should_update, State};

/// Handler for a declared DOM listener
pub type EventMethod = Rc<dyn Fn(&Component, &DomEvent)>;

/// Handler for a declared action; receives `(next, prev)`
pub type ActionMethod = Rc<dyn Fn(&Component, &Value, &Value)>;

/// Gate deciding when `ready` fires; receives `(current, prev)` state
pub type ReadyState = Rc<dyn Fn(&Component, &State, &State) -> bool>;

/// Custom element resolver: `(document, root, options)`
pub type Resolver = Rc<dyn Fn(&Document, NodeId, &ResolvedOptions) -> ElRef>;

/// A declared handler: either a method looked up on the behavior or a
/// closure
#[derive(Clone)]
pub enum Handler<M> {
    Method(Cow<'static, str>),
    Func(M),
}

impl<M> Handler<M> {
    pub fn method(name: impl Into<Cow<'static, str>>) -> Self {
        Handler::Method(name.into())
    }
}

/// How a declared element is located inside the root
#[derive(Clone)]
pub enum Selector {
    /// CSS selector; a `[]` suffix on the element name selects every match
    Css(String),
    Resolver(Resolver),
}

impl Selector {
    pub fn css(selector: &str) -> Self {
        Selector::Css(selector.to_string())
    }

    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(&Document, NodeId, &ResolvedOptions) -> ElRef + 'static,
    {
        Selector::Resolver(Rc::new(f))
    }
}

/// A resolved declared element
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ElRef {
    One(NodeId),
    Many(Vec<NodeId>),
    #[default]
    Missing,
}

impl ElRef {
    /// First node, if any
    pub fn first(&self) -> Option<NodeId> {
        match self {
            ElRef::One(node) => Some(*node),
            ElRef::Many(nodes) => nodes.first().copied(),
            ElRef::Missing => None,
        }
    }

    /// All nodes in order
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            ElRef::One(node) => vec![*node],
            ElRef::Many(nodes) => nodes.clone(),
            ElRef::Missing => Vec::new(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ElRef::Missing)
    }
}

impl From<Option<NodeId>> for ElRef {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(ElRef::Missing, ElRef::One)
    }
}

/// Declaration of a component kind
pub trait Behavior: 'static {
    /// Name used in logs and diagnostics
    fn name(&self) -> &str {
        "Component"
    }

    /// Default options; also the set of accepted option keys
    ///
    /// Called on the behavior of the instance being built, before options
    /// are resolved. A [`ComponentClass`] makes a fresh behavior per
    /// instance, so per-instance fields of `self` are visible here.
    fn default_options(&self) -> Options {
        Options::new()
    }

    /// State merged under the state passed to `init`
    fn initial_state(&self) -> State {
        State::new()
    }

    /// Named elements resolved at mount
    fn selectors(&self) -> Vec<(String, Selector)> {
        Vec::new()
    }

    /// `"event"`, `"event <css>"` or `"event @name"` keyed DOM listeners
    fn listeners(&self) -> Vec<(String, Handler<EventMethod>)> {
        Vec::new()
    }

    /// State key to handler, bound to `change:<key>` at init
    fn actions(&self) -> Vec<(String, Handler<ActionMethod>)> {
        Vec::new()
    }

    /// Named DOM listener methods
    fn event_method(&self, _name: &str) -> Option<EventMethod> {
        None
    }

    /// Named action methods
    fn action_method(&self, _name: &str) -> Option<ActionMethod> {
        None
    }

    /// Optional gate delaying `ready`
    fn ready_state(&self) -> Option<ReadyState> {
        None
    }

    fn should_update_state(&self, _key: &str, current: &Value, next: &Value) -> bool {
        default_should_update(current, next)
    }

    fn created(&self, _cx: &Component) {}

    fn before_mount(&self, _cx: &Component) {}

    fn mounted(&self, _cx: &Component) {}

    fn initialize(&self, _cx: &Component) {}

    fn ready(&self, _cx: &Component) {}

    /// Awaited before teardown starts
    fn before_destroy(&self, _cx: &Component) -> LocalBoxFuture<'static, Result<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

/// Whether a class builds DOM-bearing or detached components
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Dom,
    Detached,
}

/// A constructible component kind
///
/// Classes are values: they can be stored in options (where they are never
/// bound to the owning instance) and used as `set_ref` sources.
#[derive(Clone)]
pub struct ComponentClass {
    name: Rc<str>,
    kind: ComponentKind,
    make: Rc<dyn Fn() -> Rc<dyn Behavior>>,
}

impl ComponentClass {
    /// Class of DOM-bearing components
    pub fn new<F>(name: &str, make: F) -> Self
    where
        F: Fn() -> Rc<dyn Behavior> + 'static,
    {
        Self {
            name: Rc::from(name),
            kind: ComponentKind::Dom,
            make: Rc::new(make),
        }
    }

    /// Class of detached components
    pub fn detached<F>(name: &str, make: F) -> Self
    where
        F: Fn() -> Rc<dyn Behavior> + 'static,
    {
        Self {
            name: Rc::from(name),
            kind: ComponentKind::Detached,
            make: Rc::new(make),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Construct an instance with `options`
    pub fn construct(&self, runtime: &Runtime, options: Options) -> Component {
        let behavior = (self.make)();
        Component::with_kind(runtime, behavior, options, self.kind)
    }
}

impl std::fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
