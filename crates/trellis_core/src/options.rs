//! Component options
//!
//! Each behavior declares a default option map. Caller input is merged over
//! it at construction time: only keys present in the defaults are accepted,
//! callbacks are bound to the new instance, and the result is frozen.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::behavior::ComponentClass;
use crate::component::{Component, WeakComponent};

/// Unbound callback option; receives the owning component when invoked
pub type Callback = Rc<dyn Fn(&Component, &[Value]) -> Value>;

/// Option value as declared or supplied
#[derive(Clone)]
pub enum OptionValue {
    Value(Value),
    Callback(Callback),
    /// Component classes are passed through untouched
    Class(ComponentClass),
}

impl OptionValue {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Component, &[Value]) -> Value + 'static,
    {
        OptionValue::Callback(Rc::new(f))
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        OptionValue::Value(value)
    }
}

impl From<ComponentClass> for OptionValue {
    fn from(class: ComponentClass) -> Self {
        OptionValue::Class(class)
    }
}

impl std::fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Value(v) => write!(f, "Value({})", v),
            OptionValue::Callback(_) => write!(f, "Callback"),
            OptionValue::Class(c) => write!(f, "Class({})", c.name()),
        }
    }
}

/// Option map supplied by callers or declared as defaults
#[derive(Clone, Debug, Default)]
pub struct Options {
    entries: IndexMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: String, value: OptionValue) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    /// Plain value stored under `key`
    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.entries.get(key) {
            Some(OptionValue::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Overlay `other` on top of `self`
    pub fn merge(mut self, other: Options) -> Self {
        for (key, value) in other.entries {
            self.entries.insert(key, value);
        }
        self
    }
}

impl FromIterator<(String, OptionValue)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, OptionValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Callback bound to the component that owns the option
#[derive(Clone)]
pub struct BoundCallback {
    callback: Callback,
    owner: WeakComponent,
}

impl BoundCallback {
    /// Invoke the callback; `None` once the owner is gone
    pub fn call(&self, args: &[Value]) -> Option<Value> {
        let owner = self.owner.upgrade()?;
        Some((self.callback)(&owner, args))
    }
}

/// Resolved option value
#[derive(Clone)]
pub enum Resolved {
    Value(Value),
    Callback(BoundCallback),
    Class(ComponentClass),
}

/// Frozen options of a constructed component
#[derive(Clone, Default)]
pub struct ResolvedOptions {
    entries: IndexMap<String, Resolved>,
}

impl ResolvedOptions {
    /// Merge `input` over `defaults` for `owner`
    ///
    /// Keys missing from `defaults` are dropped with a warning.
    pub(crate) fn resolve(
        component: &str,
        defaults: Options,
        mut input: Options,
        owner: WeakComponent,
    ) -> Self {
        for key in input.keys() {
            if !defaults.contains(key) {
                warn!(component, option = key, "unknown option ignored");
            }
        }

        let entries = defaults
            .entries
            .into_iter()
            .map(|(key, default)| {
                let value = input.entries.shift_remove(&key).unwrap_or(default);
                let resolved = match value {
                    OptionValue::Value(v) => Resolved::Value(v),
                    OptionValue::Class(class) => Resolved::Class(class),
                    OptionValue::Callback(callback) => Resolved::Callback(BoundCallback {
                        callback,
                        owner: owner.clone(),
                    }),
                };
                (key, resolved)
            })
            .collect();

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Resolved> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.entries.get(key) {
            Some(Resolved::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Call a bound callback option
    pub fn call(&self, key: &str, args: &[Value]) -> Option<Value> {
        match self.entries.get(key) {
            Some(Resolved::Callback(callback)) => callback.call(args),
            _ => None,
        }
    }

    pub fn class(&self, key: &str) -> Option<&ComponentClass> {
        match self.entries.get(key) {
            Some(Resolved::Class(class)) => Some(class),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
