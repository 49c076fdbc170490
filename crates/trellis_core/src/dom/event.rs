//! Document events

use std::cell::Cell;
use std::rc::Rc;

use super::document::NodeId;

/// Listener registered on a document node
pub type DomListener = Rc<dyn Fn(&DomEvent)>;

/// An event travelling from its target up to the document node
#[derive(Debug)]
pub struct DomEvent {
    event_type: String,
    target: NodeId,
    current_target: Cell<NodeId>,
    propagation_stopped: Cell<bool>,
}

impl DomEvent {
    pub fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: Cell::new(target),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Node the event was dispatched at
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Node whose listener is currently running
    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub(crate) fn set_current_target(&self, node: NodeId) {
        self.current_target.set(node);
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}
