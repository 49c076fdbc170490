//! Application runtime
//!
//! A [`Runtime`] groups what every component of one application root
//! shares: the document, the identifier sequences and an optional
//! [`Inspector`]. Components created through `set_ref` inherit their
//! parent's runtime.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::component::Component;
use crate::dom::Document;
use crate::lifecycle::Phase;

/// Monotonic identifier source
#[derive(Debug, Default)]
pub struct Sequence {
    next: Cell<u64>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence whose first value is `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: Cell::new(start),
        }
    }

    /// Take the next value
    pub fn next_value(&self) -> u64 {
        let value = self.next.get();
        self.next.set(value + 1);
        value
    }

    /// Value the next call will return
    pub fn peek(&self) -> u64 {
        self.next.get()
    }
}

/// Observer of public component operations
///
/// Every method defaults to a no-op; implementations must not mutate the
/// components they observe.
pub trait Inspector {
    /// The component moved to a new lifecycle phase
    fn phase_changed(&self, _component: &Component, _phase: Phase) {}

    /// `set_state`/`replace_state` committed changes to `keys`
    fn state_changed(&self, _component: &Component, _keys: &[String]) {}

    /// A child was registered under `id`
    fn ref_attached(&self, _parent: &Component, _id: &str, _child: &Component) {}

    /// The child registered under `id` was released
    fn ref_released(&self, _parent: &Component, _id: &str) {}

    /// `broadcast` was called
    fn broadcast(&self, _component: &Component, _event: &str) {}
}

struct RuntimeInner {
    document: Document,
    component_ids: Sequence,
    ref_ids: Sequence,
    inspector: RefCell<Option<Rc<dyn Inspector>>>,
}

/// Shared per-application state
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Runtime over a fresh document
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(document: Document) -> Self {
        Self::with_sequences(document, Sequence::new(), Sequence::new())
    }

    /// Runtime with explicit identifier sources
    pub fn with_sequences(document: Document, component_ids: Sequence, ref_ids: Sequence) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                document,
                component_ids,
                ref_ids,
                inspector: RefCell::new(None),
            }),
        }
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// Next component uid (`c.<n>`)
    pub fn next_component_uid(&self) -> String {
        format!("c.{}", self.inner.component_ids.next_value())
    }

    /// Next generated reference id (`<prefix>.<n>`)
    pub fn next_ref_id(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.inner.ref_ids.next_value())
    }

    pub fn set_inspector(&self, inspector: Rc<dyn Inspector>) {
        *self.inner.inspector.borrow_mut() = Some(inspector);
    }

    pub fn clear_inspector(&self) {
        self.inner.inspector.borrow_mut().take();
    }

    /// Run `f` against the inspector, if one is installed
    pub(crate) fn inspect(&self, f: impl FnOnce(&dyn Inspector)) {
        let inspector = self.inner.inspector.borrow().clone();
        if let Some(inspector) = inspector {
            f(inspector.as_ref());
        }
    }
}
