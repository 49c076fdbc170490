//! Components without a document root
//!
//! Detached components keep state, events and references but never touch
//! the document themselves. They are useful as state containers that
//! coordinate DOM-bearing children; those children anchor on the nearest
//! mounted ancestor instead.

use std::ops::Deref;
use std::rc::Rc;

use crate::behavior::{Behavior, ComponentClass};
use crate::component::Component;
use crate::options::Options;
use crate::runtime::Runtime;

/// A component that can be initialized without being mounted
#[derive(Clone, Debug)]
pub struct DetachedComponent(Component);

impl DetachedComponent {
    pub fn new(runtime: &Runtime, behavior: Rc<dyn Behavior>, options: Options) -> Self {
        Self(Component::detached(runtime, behavior, options))
    }

    /// Class constructing detached instances, for use as a reference source
    pub fn class<F>(name: &str, make: F) -> ComponentClass
    where
        F: Fn() -> Rc<dyn Behavior> + 'static,
    {
        ComponentClass::detached(name, make)
    }

    pub fn into_component(self) -> Component {
        self.0
    }
}

impl Deref for DetachedComponent {
    type Target = Component;

    fn deref(&self) -> &Component {
        &self.0
    }
}

impl From<DetachedComponent> for Component {
    fn from(detached: DetachedComponent) -> Self {
        detached.0
    }
}
