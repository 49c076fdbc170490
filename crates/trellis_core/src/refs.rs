//! Child references
//!
//! A component owns named child components ("references"). `set_ref`
//! constructs or adopts a child, wires its listeners, projects parent state
//! into it, places its root under the nearest mounted ancestor and
//! initializes it. Registering the same id again replaces the previous
//! child after destroying it.

use std::rc::Rc;

use futures::future;
use serde_json::Value;
use tracing::{debug, error};

use crate::behavior::ComponentClass;
use crate::component::{change_event, Component, Target, CHANGE_ALL};
use crate::dom::NodeId;
use crate::error::{ComponentError, Result};
use crate::events::{Listener, Subscription};
use crate::options::{OptionValue, Options};
use crate::state::State;

/// Builds a child from the resolved root element and the parent state
pub type ChildFactory = Rc<dyn Fn(Option<NodeId>, &State) -> Component>;

/// Where a reference's component comes from
#[derive(Clone)]
pub enum RefSource {
    /// Constructed with the descriptor's options
    Class(ComponentClass),
    /// Adopted as is; descriptor options are ignored
    Instance(Component),
    Factory(ChildFactory),
}

/// Descriptor passed to [`Component::set_ref`]
#[derive(Clone)]
pub struct RefSpec {
    id: String,
    source: RefSource,
    el: Option<Target>,
    on: Vec<(String, Listener)>,
    options: Options,
}

impl RefSpec {
    pub fn new(id: impl Into<String>, source: RefSource) -> Self {
        Self {
            id: id.into(),
            source,
            el: None,
            on: Vec::new(),
            options: Options::new(),
        }
    }

    pub fn class(id: impl Into<String>, class: ComponentClass) -> Self {
        Self::new(id, RefSource::Class(class))
    }

    pub fn instance(id: impl Into<String>, component: Component) -> Self {
        Self::new(id, RefSource::Instance(component))
    }

    pub fn factory<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Option<NodeId>, &State) -> Component + 'static,
    {
        Self::new(id, RefSource::Factory(Rc::new(factory)))
    }

    /// Root element the child mounts on when it is not mounted yet
    pub fn el(mut self, target: impl Into<Target>) -> Self {
        self.el = Some(target.into());
        self
    }

    /// Listener registered on the child's hub before init
    pub fn on(mut self, event: &str, listener: Listener) -> Self {
        self.on.push((event.to_string(), listener));
        self
    }

    pub fn option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = self.options.merge(options);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Derives a child key from the parent state
pub type Compute = Rc<dyn Fn(&Value) -> Value>;

/// Projected value of one child state key
#[derive(Clone)]
pub enum Projected {
    /// Copied once at attach time
    Value(Value),
    /// Evaluated at attach time and again on every parent change
    Compute(Compute),
}

/// Parent-to-child state mapping
///
/// Keys are either a child key, in which case a computed value receives the
/// whole parent state as an object and re-runs on `change:*`, or
/// `"source>target"`, in which case it receives the parent's `source` value
/// and re-runs on `change:source`.
#[derive(Clone, Default)]
pub struct Projection {
    entries: Vec<(String, Projected)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, key: &str, value: Value) -> Self {
        self.entries.push((key.to_string(), Projected::Value(value)));
        self
    }

    pub fn compute<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        self.entries
            .push((key.to_string(), Projected::Compute(Rc::new(f))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('>') {
        Some((source, target)) => (Some(source.trim()), target.trim()),
        None => (None, key),
    }
}

fn release(subscriptions: Vec<Subscription>) {
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
}

impl Component {
    /// Attach a child under `spec.id`
    pub async fn set_ref(&self, spec: RefSpec, projection: Projection) -> Result<Component> {
        let RefSpec {
            id,
            source,
            el,
            on,
            options,
        } = spec;
        let document = self.document().clone();

        let el = match el {
            Some(Target::Node(node)) => Some(node),
            Some(Target::Selector(selector)) => {
                document.query_selector(document.root(), &selector)?
            }
            None => None,
        };

        let child = match source {
            RefSource::Class(class) => class.construct(self.runtime(), options),
            RefSource::Instance(component) => {
                if !options.is_empty() {
                    debug!(reference = %id, "options ignored for an existing instance");
                }
                component
            }
            RefSource::Factory(factory) => factory(el, &self.state()),
        };

        if let Some(context) = self.context() {
            child.inherit_context(context);
        }
        child.set_parent(Some(self));

        if id.is_empty() {
            return Err(ComponentError::MissingRefId);
        }

        for (event, listener) in on {
            let _ = child.on(&event, listener);
        }

        let (initial, live) = self.project(&child, projection);

        if let Err(err) = self.place(&id, &child, el).await {
            release(live);
            child.set_parent(None);
            return Err(err);
        }

        self.inner
            .refs
            .borrow_mut()
            .insert(id.clone(), child.clone());
        self.inner.projections.borrow_mut().insert(id.clone(), live);
        self.runtime()
            .inspect(|inspector| inspector.ref_attached(self, &id, &child));
        debug!(component = %self.label(), reference = %id, child = child.name(), "reference attached");

        child.init(initial)?;
        Ok(child)
    }

    /// Compute the child's initial state and subscribe the live projections
    fn project(&self, child: &Component, projection: Projection) -> (State, Vec<Subscription>) {
        let parent_state = self.state();
        let mut initial = State::new();
        let mut live = Vec::new();

        for (key, projected) in projection.entries {
            let (source, target) = split_key(&key);
            let target = target.to_string();
            match projected {
                Projected::Value(value) => {
                    initial.insert(target, value);
                }
                Projected::Compute(compute) => {
                    let input = match source {
                        Some(source) => parent_state.get(source).cloned().unwrap_or(Value::Null),
                        None => Value::Object(parent_state.clone()),
                    };
                    initial.insert(target.clone(), compute(&input));

                    let event = source.map_or_else(|| CHANGE_ALL.to_string(), change_event);
                    let weak = child.downgrade();
                    let subscription = self.on(
                        &event,
                        Rc::new(move |args: &[Value]| {
                            let Some(child) = weak.upgrade() else {
                                return;
                            };
                            let input = args.first().cloned().unwrap_or(Value::Null);
                            let mut update = State::new();
                            update.insert(target.clone(), compute(&input));
                            child.set_state(update);
                        }),
                    );
                    live.push(subscription);
                }
            }
        }

        (initial, live)
    }

    /// Nearest mounted component on the ancestor chain, self included
    fn dom_anchor(&self) -> Option<NodeId> {
        let mut current = Some(self.clone());
        while let Some(component) = current {
            if let Some(el) = component.el() {
                return Some(el);
            }
            current = component.parent();
        }
        None
    }

    /// Replace any previous holder of `id` and put the child's root in the
    /// document
    async fn place(&self, id: &str, child: &Component, el: Option<NodeId>) -> Result<()> {
        let anchor = if child.is_detached() {
            None
        } else {
            Some(
                self.dom_anchor()
                    .ok_or_else(|| ComponentError::NoDomAnchor(id.to_string()))?,
            )
        };

        let mut replaced = None;
        if let Some(previous) = self.get_ref(id) {
            debug!(component = %self.label(), reference = %id, "replacing reference");
            // the previous child stays registered until its teardown succeeds
            previous.destroy().await?;
            self.forget_ref(id);
            replaced = previous.el();
        }

        let Some(anchor) = anchor else {
            return Ok(());
        };

        let root = match child.el() {
            Some(root) => root,
            None => {
                let node = el.ok_or_else(|| ComponentError::MissingRoot(id.to_string()))?;
                child.mount(node, None)?;
                child
                    .el()
                    .ok_or_else(|| ComponentError::MissingRoot(id.to_string()))?
            }
        };

        let document = self.document();
        if let Some(old) = replaced.filter(|old| *old != root && document.contains(anchor, *old)) {
            if let Some(parent) = document.parent(old) {
                document.replace_child(parent, root, old)?;
                return Ok(());
            }
        }
        if !document.contains(anchor, root) {
            document.append_child(anchor, root)?;
        }
        Ok(())
    }

    /// Drop the registry entry for `id` together with its projections
    fn forget_ref(&self, id: &str) {
        self.inner.refs.borrow_mut().shift_remove(id);
        self.release_projections(id);
        self.runtime()
            .inspect(|inspector| inspector.ref_released(self, id));
    }

    fn release_projections(&self, id: &str) {
        let subscriptions = self.inner.projections.borrow_mut().remove(id);
        if let Some(subscriptions) = subscriptions {
            release(subscriptions);
        }
    }

    /// Child registered under `id`
    pub fn get_ref(&self, id: &str) -> Option<Component> {
        self.inner.refs.borrow().get(id).cloned()
    }

    /// Registered reference ids in registration order
    pub fn ref_ids(&self) -> Vec<String> {
        self.inner.refs.borrow().keys().cloned().collect()
    }

    pub fn refs(&self) -> Vec<(String, Component)> {
        self.inner
            .refs
            .borrow()
            .iter()
            .map(|(id, child)| (id.clone(), child.clone()))
            .collect()
    }

    /// Destroy one child; with `detach` its root is removed from the document
    pub async fn destroy_ref(&self, id: &str, detach: bool) -> Result<()> {
        let child = self
            .get_ref(id)
            .ok_or_else(|| ComponentError::UnknownRef(id.to_string()))?;

        child.destroy().await?;
        self.forget_ref(id);

        if detach {
            if let Some(el) = child.el() {
                self.document().remove(el);
            }
        }
        Ok(())
    }

    /// Destroy every child concurrently
    ///
    /// Every child is given the chance to finish. The registry is cleared
    /// only when all of them succeeded; otherwise the first error is
    /// returned.
    pub async fn destroy_refs(&self) -> Result<()> {
        let refs = self.refs();
        if refs.is_empty() {
            return Ok(());
        }

        let results = future::join_all(refs.iter().map(|(_, child)| child.destroy())).await;

        let mut first = None;
        for ((id, _), result) in refs.iter().zip(results) {
            if let Err(err) = result {
                error!(component = %self.label(), reference = %id, error = %err, "failed to destroy reference");
                if first.is_none() {
                    first = Some(err);
                }
            }
        }
        if let Some(err) = first {
            return Err(err);
        }

        let ids: Vec<String> = self
            .inner
            .refs
            .borrow_mut()
            .drain(..)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.release_projections(&id);
            self.runtime()
                .inspect(|inspector| inspector.ref_released(self, &id));
        }
        Ok(())
    }

    /// Emit `broadcast:<event>` on every direct child
    pub fn broadcast(&self, event: &str, args: &[Value]) {
        self.runtime()
            .inspect(|inspector| inspector.broadcast(self, event));

        let children: Vec<Component> = self.inner.refs.borrow().values().cloned().collect();
        if children.is_empty() {
            debug!(component = %self.label(), event, "broadcast without references");
            return;
        }
        let name = format!("broadcast:{}", event);
        for child in children {
            child.emit(&name, args);
        }
    }
}
