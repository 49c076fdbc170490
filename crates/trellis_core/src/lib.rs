//! Trellis Core Runtime
//!
//! Lightweight components layered over a document:
//!
//! - **Components**: options, keyed state with change notifications,
//!   declared elements, DOM listeners and state-bound actions
//! - **References**: named child components with state projection,
//!   replacement and recursive asynchronous teardown
//! - **Event Hub**: per-component named events with wildcard listeners
//!
//! # Example
//!
//! ```rust
//! use serde_json::{json, Value};
//! use trellis_core::{ComponentDef, Options, Projection, RefSpec, Runtime, State};
//!
//! let runtime = Runtime::new();
//! let doc = runtime.document().clone();
//! let root = doc.append_element(doc.body(), "div").unwrap();
//! let slot = doc.append_element(root, "span").unwrap();
//!
//! let app = ComponentDef::new("App")
//!     .state("total", json!(5))
//!     .build(&runtime, Options::new());
//! app.mount(root, Some(State::new())).unwrap();
//!
//! let badge = ComponentDef::new("Badge").state("count", json!(0)).class();
//! let child = pollster::block_on(app.set_ref(
//!     RefSpec::class("badge", badge).el(slot),
//!     Projection::new().compute("total>count", |total: &Value| total.clone()),
//! ))
//! .unwrap();
//! assert_eq!(child.get_state("count"), Some(json!(5)));
//!
//! app.set_state(json!({ "total": 7 }));
//! assert_eq!(child.get_state("count"), Some(json!(7)));
//! ```

pub mod behavior;
pub mod component;
pub mod context;
pub mod define;
pub mod detached;
pub mod dom;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod options;
pub mod refs;
pub mod runtime;
pub mod state;

pub use behavior::{
    ActionMethod, Behavior, ComponentClass, ComponentKind, ElRef, EventMethod, Handler,
    ReadyState, Resolver, Selector,
};
pub use component::{change_event, Component, Target, WeakComponent, CHANGE_ALL, UID_ATTRIBUTE};
pub use context::Context;
pub use define::ComponentDef;
pub use detached::DetachedComponent;
pub use dom::{dataset, Document, DomEvent, DomListener, ListenerId, NodeId, NodeKind};
pub use error::{ComponentError, DomError, Result};
pub use events::{EventHub, Listener, Subscription, SubscriptionGuard, WILDCARD};
pub use lifecycle::{Lifecycle, Phase, Trigger};
pub use options::{BoundCallback, Callback, OptionValue, Options, Resolved, ResolvedOptions};
pub use refs::{ChildFactory, Compute, Projected, Projection, RefSource, RefSpec};
pub use runtime::{Inspector, Runtime, Sequence};
pub use state::{default_should_update, state_from, State, StateUpdate};
