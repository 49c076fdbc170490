//! Component core
//!
//! A [`Component`] binds a [`Behavior`] to an optional document root and a
//! keyed [`State`]. It is a cheap handle: clones refer to the same instance.
//!
//! Lifecycle:
//!
//! 1. construction resolves options and calls `created`
//! 2. `mount` binds the root, resolves declared elements and listeners, and
//!    usually chains into `init`
//! 3. `init` assigns the uid, binds actions, commits the initial state and
//!    fires `ready` (possibly gated by `ready_state`)
//! 4. `destroy` tears the instance and its references down
//!
//! Closures the component registers on its own hub, on the document or on
//! its parent only hold [`WeakComponent`] handles, so dropping the last
//! strong handle releases the instance.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::behavior::{
    ActionMethod, Behavior, ComponentKind, ElRef, EventMethod, Handler, Selector,
};
use crate::context::Context;
use crate::dom::{Document, DomEvent, DomListener, ListenerId, NodeId};
use crate::error::{ComponentError, Result};
use crate::events::{EventHub, Listener, Subscription};
use crate::lifecycle::{Lifecycle, Phase, Trigger};
use crate::options::{Options, ResolvedOptions};
use crate::runtime::Runtime;
use crate::state::{self, State, StateUpdate};

/// Attribute marking an element bound to a live component
pub const UID_ATTRIBUTE: &str = "data-trellis-uid";

/// Aggregate state change event
pub const CHANGE_ALL: &str = "change:*";

static NULL: Value = Value::Null;

/// Name of the per-key change event
pub fn change_event(key: &str) -> String {
    format!("change:{}", key)
}

/// Where to mount a component
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    /// CSS selector resolved against the whole document
    Selector(String),
}

impl From<NodeId> for Target {
    fn from(node: NodeId) -> Self {
        Target::Node(node)
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}

struct DomBinding {
    node: NodeId,
    listener: ListenerId,
}

pub(crate) struct Inner {
    runtime: Runtime,
    behavior: Rc<dyn Behavior>,
    kind: ComponentKind,
    options: ResolvedOptions,
    hub: EventHub,
    state: RefCell<State>,
    el: Cell<Option<NodeId>>,
    els: RefCell<IndexMap<String, ElRef>>,
    bindings: RefCell<Vec<DomBinding>>,
    parent: RefCell<Option<WeakComponent>>,
    context: RefCell<Option<Context>>,
    uid: RefCell<Option<String>>,
    active: Cell<bool>,
    lifecycle: RefCell<Lifecycle>,
    pub(crate) refs: RefCell<IndexMap<String, Component>>,
    /// Parent-side projection subscriptions, per reference id
    pub(crate) projections: RefCell<FxHashMap<String, Vec<Subscription>>>,
}

/// Handle to a component instance
#[derive(Clone)]
pub struct Component {
    pub(crate) inner: Rc<Inner>,
}

/// Non-owning component handle
#[derive(Clone, Default)]
pub struct WeakComponent(Weak<Inner>);

impl WeakComponent {
    /// A handle that never upgrades
    pub fn new() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|inner| Component { inner })
    }
}

impl Component {
    /// Construct a DOM-bearing component
    pub fn new(runtime: &Runtime, behavior: Rc<dyn Behavior>, options: Options) -> Component {
        Self::with_kind(runtime, behavior, options, ComponentKind::Dom)
    }

    /// Construct a component that never has a document root
    pub fn detached(runtime: &Runtime, behavior: Rc<dyn Behavior>, options: Options) -> Component {
        Self::with_kind(runtime, behavior, options, ComponentKind::Detached)
    }

    pub(crate) fn with_kind(
        runtime: &Runtime,
        behavior: Rc<dyn Behavior>,
        options: Options,
        kind: ComponentKind,
    ) -> Component {
        let defaults = behavior.default_options();
        let inner = Rc::new_cyclic(|weak: &Weak<Inner>| {
            let options = ResolvedOptions::resolve(
                behavior.name(),
                defaults,
                options,
                WeakComponent(weak.clone()),
            );
            Inner {
                runtime: runtime.clone(),
                behavior,
                kind,
                options,
                hub: EventHub::new(),
                state: RefCell::new(State::new()),
                el: Cell::new(None),
                els: RefCell::new(IndexMap::new()),
                bindings: RefCell::new(Vec::new()),
                parent: RefCell::new(None),
                context: RefCell::new(None),
                uid: RefCell::new(None),
                active: Cell::new(false),
                lifecycle: RefCell::new(Lifecycle::new()),
                refs: RefCell::new(IndexMap::new()),
                projections: RefCell::new(FxHashMap::default()),
            }
        });

        let component = Component { inner };
        component.behavior().created(&component);
        component
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn document(&self) -> &Document {
        self.inner.runtime.document()
    }

    pub fn behavior(&self) -> Rc<dyn Behavior> {
        self.inner.behavior.clone()
    }

    pub fn name(&self) -> &str {
        self.inner.behavior.name()
    }

    pub fn kind(&self) -> ComponentKind {
        self.inner.kind
    }

    pub fn is_detached(&self) -> bool {
        self.inner.kind == ComponentKind::Detached
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.inner.options
    }

    /// Identity assigned by `init` (or adopted from the root element)
    pub fn uid(&self) -> Option<String> {
        self.inner.uid.borrow().clone()
    }

    /// Root element
    pub fn el(&self) -> Option<NodeId> {
        self.inner.el.get()
    }

    /// Declared element resolved at mount
    pub fn els(&self, name: &str) -> ElRef {
        self.inner.els.borrow().get(name).cloned().unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lifecycle.borrow().current()
    }

    /// Lifecycle transitions taken so far
    pub fn lifecycle_history(&self) -> Vec<(Phase, Trigger, Phase)> {
        self.inner.lifecycle.borrow().history().to_vec()
    }

    pub fn parent(&self) -> Option<Component> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(WeakComponent::upgrade)
    }

    pub(crate) fn set_parent(&self, parent: Option<&Component>) {
        *self.inner.parent.borrow_mut() = parent.map(Component::downgrade);
    }

    pub fn context(&self) -> Option<Context> {
        self.inner.context.borrow().clone()
    }

    /// Provide the context for this component and its future references
    ///
    /// A context is read-only once set; later calls are ignored and return
    /// false.
    pub fn provide_context(&self, context: Context) -> bool {
        let mut slot = self.inner.context.borrow_mut();
        if slot.is_some() {
            warn!(component = %self.label(), "context already provided");
            return false;
        }
        *slot = Some(context);
        true
    }

    /// Take over the parent's context by reference
    pub(crate) fn inherit_context(&self, context: Context) {
        *self.inner.context.borrow_mut() = Some(context);
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// `Name#uid` used in log fields
    pub fn label(&self) -> String {
        match self.uid() {
            Some(uid) => format!("{}#{}", self.name(), uid),
            None => self.name().to_string(),
        }
    }

    fn advance(&self, trigger: Trigger) {
        let phase = self.inner.lifecycle.borrow_mut().send(trigger);
        match phase {
            Some(phase) => {
                debug!(component = %self.label(), phase = phase.as_str(), "lifecycle");
                self.inner
                    .runtime
                    .inspect(|inspector| inspector.phase_changed(self, phase));
            }
            None => debug!(component = %self.label(), ?trigger, "lifecycle trigger ignored"),
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn hub(&self) -> &EventHub {
        &self.inner.hub
    }

    pub fn on(&self, name: &str, listener: Listener) -> Subscription {
        self.inner.hub.on(name, listener)
    }

    pub fn once(&self, name: &str, listener: Listener) -> Subscription {
        self.inner.hub.once(name, listener)
    }

    pub fn off(&self, name: Option<&str>, listener: Option<&Listener>) {
        self.inner.hub.off(name, listener)
    }

    pub fn emit(&self, name: &str, args: &[Value]) {
        self.inner.hub.emit(name, args)
    }

    // =========================================================================
    // Mount
    // =========================================================================

    /// Bind the component to a root element
    ///
    /// `state` of `None` mounts without initializing. A selector matching
    /// nothing is not an error: the call logs and returns the unchanged
    /// instance.
    pub fn mount(&self, target: impl Into<Target>, state: Option<State>) -> Result<Component> {
        if self.is_detached() {
            return Err(ComponentError::DetachedMount);
        }
        if self.inner.el.get().is_some() {
            return Err(ComponentError::AlreadyMounted);
        }

        let document = self.document().clone();
        let target = target.into();
        let el = match &target {
            Target::Node(node) => Some(*node).filter(|node| document.exists(*node)),
            Target::Selector(selector) => document.query_selector(document.root(), selector)?,
        };
        let Some(el) = el else {
            warn!(component = %self.label(), ?target, "mount target not found");
            return Ok(self.clone());
        };

        self.inner.el.set(Some(el));
        let behavior = self.behavior();
        behavior.before_mount(self);
        self.advance(Trigger::Mount);

        self.resolve_selectors(&document, el)?;
        self.attach_listeners(&document, el)?;

        if let Some(state) = state {
            self.init(state)?;
        }

        behavior.mounted(self);
        Ok(self.clone())
    }

    fn resolve_selectors(&self, document: &Document, root: NodeId) -> Result<()> {
        let mut els = IndexMap::new();
        for (key, selector) in self.behavior().selectors() {
            let (name, all) = match key.strip_suffix("[]") {
                Some(name) => (name.to_string(), true),
                None => (key.clone(), false),
            };
            let resolved = match selector {
                Selector::Css(css) if all => ElRef::Many(document.query_selector_all(root, &css)?),
                Selector::Css(css) => document.query_selector(root, &css)?.into(),
                Selector::Resolver(resolve) => resolve(document, root, &self.inner.options),
            };
            els.insert(name, resolved);
        }
        *self.inner.els.borrow_mut() = els;
        Ok(())
    }

    fn attach_listeners(&self, document: &Document, root: NodeId) -> Result<()> {
        for (key, handler) in self.behavior().listeners() {
            let mut parts = key.split_whitespace();
            let Some(event) = parts.next() else {
                continue;
            };
            let target = parts.collect::<Vec<_>>().join(" ");
            let method = self.event_handler(handler)?;

            let nodes = if target.is_empty() {
                vec![root]
            } else if let Some(name) = target.strip_prefix('@') {
                let nodes = self.els(name).nodes();
                if nodes.is_empty() {
                    warn!(component = %self.label(), listener = %key, "listener target not resolved");
                }
                nodes
            } else {
                document.query_selector_all(root, &target)?
            };

            for node in nodes {
                let weak = self.downgrade();
                let method = method.clone();
                let listener: DomListener = Rc::new(move |event: &DomEvent| {
                    if let Some(cx) = weak.upgrade() {
                        method(&cx, event);
                    }
                });
                let listener = document.add_event_listener(node, event, listener)?;
                self.inner
                    .bindings
                    .borrow_mut()
                    .push(DomBinding { node, listener });
            }
        }
        Ok(())
    }

    fn remove_listeners(&self) {
        let bindings = std::mem::take(&mut *self.inner.bindings.borrow_mut());
        let document = self.document();
        for binding in bindings {
            document.remove_event_listener(binding.node, binding.listener);
        }
    }

    /// Number of DOM listeners currently attached by this component
    pub fn listener_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    fn event_handler(&self, handler: Handler<EventMethod>) -> Result<EventMethod> {
        match handler {
            Handler::Func(f) => Ok(f),
            Handler::Method(name) => {
                self.inner
                    .behavior
                    .event_method(&name)
                    .ok_or_else(|| ComponentError::UnknownMethod {
                        component: self.name().to_string(),
                        method: name.into_owned(),
                    })
            }
        }
    }

    fn action_handler(&self, handler: Handler<ActionMethod>) -> Result<ActionMethod> {
        match handler {
            Handler::Func(f) => Ok(f),
            Handler::Method(name) => {
                self.inner
                    .behavior
                    .action_method(&name)
                    .ok_or_else(|| ComponentError::UnknownMethod {
                        component: self.name().to_string(),
                        method: name.into_owned(),
                    })
            }
        }
    }

    // =========================================================================
    // Init
    // =========================================================================

    /// Establish state and fire the ready hooks
    ///
    /// On an element already carrying [`UID_ATTRIBUTE`] the existing identity
    /// is adopted and nothing else happens.
    pub fn init(&self, state: State) -> Result<Component> {
        let el = self.inner.el.get();
        if !self.is_detached() && el.is_none() {
            return Err(ComponentError::NotMounted);
        }

        let document = self.document().clone();
        if let Some(el) = el {
            if let Some(existing) = document.attribute(el, UID_ATTRIBUTE) {
                warn!(component = self.name(), uid = %existing, "element already initialized");
                *self.inner.uid.borrow_mut() = Some(existing);
                return Ok(self.clone());
            }
        }
        if matches!(self.phase(), Phase::Active | Phase::Destroyed) {
            warn!(component = %self.label(), phase = self.phase().as_str(), "init skipped");
            return Ok(self.clone());
        }

        let uid = self.inner.runtime.next_component_uid();
        if let Some(el) = el {
            document.set_attribute(el, UID_ATTRIBUTE, &uid)?;
            if document.id(el).is_none() {
                document.set_attribute(el, "id", &uid)?;
            }
        }
        *self.inner.uid.borrow_mut() = Some(uid);

        let behavior = self.behavior();
        behavior.initialize(self);
        self.bind_actions()?;

        let mut initial = behavior.initial_state();
        for (key, value) in state {
            initial.insert(key, value);
        }
        self.replace_state(initial);

        self.inner.active.set(true);
        self.advance(Trigger::Init);

        match behavior.ready_state() {
            Some(gate) => self.gate_ready(gate),
            None => behavior.ready(self),
        }
        Ok(self.clone())
    }

    fn bind_actions(&self) -> Result<()> {
        let mut actions = IndexMap::new();
        for (key, handler) in self.behavior().actions() {
            if actions.insert(key.clone(), handler).is_some() {
                debug!(component = %self.label(), action = %key, "action redeclared, last declaration wins");
            }
        }

        for (key, handler) in actions {
            let method = self.action_handler(handler)?;
            let weak = self.downgrade();
            let _ = self.inner.hub.on(
                &change_event(&key),
                Rc::new(move |args: &[Value]| {
                    if let Some(cx) = weak.upgrade() {
                        let next = args.first().unwrap_or(&NULL);
                        let prev = args.get(1).unwrap_or(&NULL);
                        method(&cx, next, prev);
                    }
                }),
            );
        }
        Ok(())
    }

    fn gate_ready(&self, gate: crate::behavior::ReadyState) {
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let pending = slot.clone();
        let weak = self.downgrade();
        let subscription = self.inner.hub.on(
            CHANGE_ALL,
            Rc::new(move |args: &[Value]| {
                let Some(cx) = weak.upgrade() else {
                    return;
                };
                let current = as_state(args.first());
                let prev = as_state(args.get(1));
                if gate(&cx, &current, &prev) {
                    if let Some(subscription) = pending.borrow_mut().take() {
                        subscription.unsubscribe();
                    }
                    cx.behavior().ready(&cx);
                }
            }),
        );
        *slot.borrow_mut() = Some(subscription);
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Snapshot of the whole state
    pub fn state(&self) -> State {
        self.inner.state.borrow().clone()
    }

    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().get(key).cloned()
    }

    pub fn get_state_or(&self, key: &str, default: Value) -> Value {
        self.get_state(key).unwrap_or(default)
    }

    /// Update existing keys and notify `change:<key>` then `change:*`
    pub fn set_state(&self, update: impl Into<StateUpdate>) {
        self.apply_update(update.into(), false);
    }

    /// Update existing keys without emitting change events
    pub fn set_state_silent(&self, update: impl Into<StateUpdate>) {
        self.apply_update(update.into(), true);
    }

    /// Replace the whole state, notifying every key
    pub fn replace_state(&self, state: State) {
        self.apply_replace(state, false);
    }

    pub fn replace_state_silent(&self, state: State) {
        self.apply_replace(state, true);
    }

    fn apply_update(&self, update: StateUpdate, silent: bool) {
        let current = self.state();
        let partial = update.resolve(&current);
        let behavior = self.behavior();
        let diff = state::diff(&current, &partial, |key, prev, next| {
            behavior.should_update_state(key, prev, next)
        });

        for key in &diff.unknown {
            debug!(component = %self.label(), key = %key, "ignoring unknown state key");
        }
        if diff.changed.is_empty() {
            return;
        }

        *self.inner.state.borrow_mut() = diff.next.clone();
        let keys: Vec<String> = diff.changed.iter().map(|(key, _)| key.clone()).collect();
        self.inner
            .runtime
            .inspect(|inspector| inspector.state_changed(self, &keys));

        if silent {
            return;
        }
        for (key, prev) in &diff.changed {
            let next = diff.next.get(key).cloned().unwrap_or(Value::Null);
            self.inner.hub.emit(&change_event(key), &[next, prev.clone()]);
        }
        self.inner
            .hub
            .emit(CHANGE_ALL, &[Value::Object(diff.next), Value::Object(current)]);
    }

    fn apply_replace(&self, next: State, silent: bool) {
        let prev = std::mem::replace(&mut *self.inner.state.borrow_mut(), next.clone());
        let keys: Vec<String> = next.keys().cloned().collect();
        self.inner
            .runtime
            .inspect(|inspector| inspector.state_changed(self, &keys));

        if silent {
            return;
        }
        for (key, value) in &next {
            let old = prev.get(key).cloned().unwrap_or(Value::Null);
            self.inner.hub.emit(&change_event(key), &[value.clone(), old]);
        }
        self.inner
            .hub
            .emit(CHANGE_ALL, &[Value::Object(next), Value::Object(prev)]);
    }

    // =========================================================================
    // Destroy
    // =========================================================================

    /// Tear down the component and, recursively, its references
    pub fn destroy(&self) -> LocalBoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move {
            let behavior = this.behavior();
            if let Err(err) = behavior.before_destroy(&this).await {
                error!(component = %this.label(), error = %err, "before_destroy failed");
                return Err(err);
            }

            this.remove_listeners();
            this.set_parent(None);
            this.inner.hub.off(None, None);
            if let Some(el) = this.el() {
                this.document().remove_attribute(el, UID_ATTRIBUTE);
            }

            this.destroy_refs().await?;

            this.inner.active.set(false);
            this.advance(Trigger::Destroy);
            Ok(())
        })
    }
}

fn as_state(value: Option<&Value>) -> State {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => State::new(),
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("uid", &self.uid())
            .field("phase", &self.phase())
            .field("el", &self.el())
            .finish()
    }
}
