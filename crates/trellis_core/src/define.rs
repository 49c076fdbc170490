//! Closure-built component definitions
//!
//! [`ComponentDef`] implements [`Behavior`] from closures collected through a
//! builder, for components that do not warrant their own type. `extend`
//! derives a new definition that inherits every declaration and can
//! override any of them by key.
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{ComponentDef, Options, Runtime, State};
//!
//! let list = ComponentDef::new("List")
//!     .option("limit", json!(10))
//!     .state("items", json!([]))
//!     .on_change("items", |cx, next, _prev| {
//!         let count = next.as_array().map_or(0, Vec::len);
//!         cx.emit("counted", &[json!(count)]);
//!     });
//! let paged = list.extend("PagedList").state("page", json!(1));
//!
//! let runtime = Runtime::new();
//! let component = paged.build_detached(&runtime, Options::new());
//! component.init(State::new()).unwrap();
//! assert_eq!(component.get_state("page"), Some(json!(1)));
//! ```

use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};
use indexmap::IndexMap;
use serde_json::Value;

use crate::behavior::{
    ActionMethod, Behavior, ComponentClass, EventMethod, Handler, ReadyState, Selector,
};
use crate::component::Component;
use crate::dom::DomEvent;
use crate::error::Result;
use crate::options::{OptionValue, Options};
use crate::runtime::Runtime;
use crate::state::{default_should_update, State};

type Hook = Rc<dyn Fn(&Component)>;
type DestroyHook = Rc<dyn Fn(&Component) -> LocalBoxFuture<'static, Result<()>>>;
type ShouldUpdate = Rc<dyn Fn(&str, &Value, &Value) -> bool>;

#[derive(Clone, Default)]
struct Hooks {
    created: Option<Hook>,
    before_mount: Option<Hook>,
    mounted: Option<Hook>,
    initialize: Option<Hook>,
    ready: Option<Hook>,
    before_destroy: Option<DestroyHook>,
}

fn run(hook: &Option<Hook>, cx: &Component) {
    if let Some(hook) = hook {
        hook(cx);
    }
}

/// Insert or replace by key, keeping the original position
fn upsert<T>(entries: &mut Vec<(String, T)>, key: &str, value: T) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key.to_string(), value)),
    }
}

/// Component behavior assembled from closures
#[derive(Clone)]
pub struct ComponentDef {
    name: String,
    super_name: Option<String>,
    options: Options,
    state: State,
    selectors: Vec<(String, Selector)>,
    listeners: Vec<(String, Handler<EventMethod>)>,
    actions: Vec<(String, Handler<ActionMethod>)>,
    event_methods: IndexMap<String, EventMethod>,
    action_methods: IndexMap<String, ActionMethod>,
    ready_state: Option<ReadyState>,
    should_update: Option<ShouldUpdate>,
    hooks: Hooks,
}

impl ComponentDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: None,
            options: Options::new(),
            state: State::new(),
            selectors: Vec::new(),
            listeners: Vec::new(),
            actions: Vec::new(),
            event_methods: IndexMap::new(),
            action_methods: IndexMap::new(),
            ready_state: None,
            should_update: None,
            hooks: Hooks::default(),
        }
    }

    /// Derive a definition inheriting every declaration of `self`
    pub fn extend(&self, name: &str) -> Self {
        let mut def = self.clone();
        def.super_name = Some(self.name.clone());
        def.name = name.to_string();
        def
    }

    /// Name of the definition this one extends
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn state(mut self, key: &str, value: Value) -> Self {
        self.state.insert(key.to_string(), value);
        self
    }

    pub fn selector(mut self, name: &str, selector: Selector) -> Self {
        upsert(&mut self.selectors, name, selector);
        self
    }

    pub fn listener(mut self, key: &str, handler: Handler<EventMethod>) -> Self {
        upsert(&mut self.listeners, key, handler);
        self
    }

    /// Listener given as a closure
    pub fn on_event<F>(self, key: &str, f: F) -> Self
    where
        F: Fn(&Component, &DomEvent) + 'static,
    {
        self.listener(key, Handler::Func(Rc::new(f)))
    }

    /// Declared action; a repeated key keeps the last handler
    pub fn action(mut self, key: &str, handler: Handler<ActionMethod>) -> Self {
        upsert(&mut self.actions, key, handler);
        self
    }

    /// Action given as a closure
    pub fn on_change<F>(self, key: &str, f: F) -> Self
    where
        F: Fn(&Component, &Value, &Value) + 'static,
    {
        self.action(key, Handler::Func(Rc::new(f)))
    }

    /// Named method usable from `listener(.., Handler::method(name))`
    pub fn event_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Component, &DomEvent) + 'static,
    {
        self.event_methods.insert(name.to_string(), Rc::new(f));
        self
    }

    /// Named method usable from `action(.., Handler::method(name))`
    pub fn action_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Component, &Value, &Value) + 'static,
    {
        self.action_methods.insert(name.to_string(), Rc::new(f));
        self
    }

    pub fn ready_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&Component, &State, &State) -> bool + 'static,
    {
        self.ready_state = Some(Rc::new(f));
        self
    }

    pub fn should_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value, &Value) -> bool + 'static,
    {
        self.should_update = Some(Rc::new(f));
        self
    }

    pub fn on_created(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.hooks.created = Some(Rc::new(f));
        self
    }

    pub fn on_before_mount(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.hooks.before_mount = Some(Rc::new(f));
        self
    }

    pub fn on_mounted(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.hooks.mounted = Some(Rc::new(f));
        self
    }

    pub fn on_initialize(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.hooks.initialize = Some(Rc::new(f));
        self
    }

    pub fn on_ready(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.hooks.ready = Some(Rc::new(f));
        self
    }

    pub fn on_before_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&Component) -> LocalBoxFuture<'static, Result<()>> + 'static,
    {
        self.hooks.before_destroy = Some(Rc::new(f));
        self
    }

    /// Class of DOM-bearing components sharing this definition
    pub fn class(self) -> ComponentClass {
        let name = self.name.clone();
        let def = Rc::new(self);
        ComponentClass::new(&name, move || def.clone() as Rc<dyn Behavior>)
    }

    /// Class of detached components sharing this definition
    pub fn detached_class(self) -> ComponentClass {
        let name = self.name.clone();
        let def = Rc::new(self);
        ComponentClass::detached(&name, move || def.clone() as Rc<dyn Behavior>)
    }

    pub fn build(self, runtime: &Runtime, options: Options) -> Component {
        Component::new(runtime, Rc::new(self), options)
    }

    pub fn build_detached(self, runtime: &Runtime, options: Options) -> Component {
        Component::detached(runtime, Rc::new(self), options)
    }
}

impl std::fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("super_name", &self.super_name)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Behavior for ComponentDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_options(&self) -> Options {
        self.options.clone()
    }

    fn initial_state(&self) -> State {
        self.state.clone()
    }

    fn selectors(&self) -> Vec<(String, Selector)> {
        self.selectors.clone()
    }

    fn listeners(&self) -> Vec<(String, Handler<EventMethod>)> {
        self.listeners.clone()
    }

    fn actions(&self) -> Vec<(String, Handler<ActionMethod>)> {
        self.actions.clone()
    }

    fn event_method(&self, name: &str) -> Option<EventMethod> {
        self.event_methods.get(name).cloned()
    }

    fn action_method(&self, name: &str) -> Option<ActionMethod> {
        self.action_methods.get(name).cloned()
    }

    fn ready_state(&self) -> Option<ReadyState> {
        self.ready_state.clone()
    }

    fn should_update_state(&self, key: &str, current: &Value, next: &Value) -> bool {
        match &self.should_update {
            Some(f) => f(key, current, next),
            None => default_should_update(current, next),
        }
    }

    fn created(&self, cx: &Component) {
        run(&self.hooks.created, cx);
    }

    fn before_mount(&self, cx: &Component) {
        run(&self.hooks.before_mount, cx);
    }

    fn mounted(&self, cx: &Component) {
        run(&self.hooks.mounted, cx);
    }

    fn initialize(&self, cx: &Component) {
        run(&self.hooks.initialize, cx);
    }

    fn ready(&self, cx: &Component) {
        run(&self.hooks.ready, cx);
    }

    fn before_destroy(&self, cx: &Component) -> LocalBoxFuture<'static, Result<()>> {
        match &self.hooks.before_destroy {
            Some(hook) => hook(cx),
            None => Box::pin(future::ready(Ok(()))),
        }
    }
}
