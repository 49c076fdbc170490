//! Minimal document model
//!
//! The component core only needs a handful of capabilities from a document:
//! selector lookup relative to a root, an element check, parent/child
//! manipulation, attributes and event listeners. This module provides them
//! over an in-memory node arena so components run the same way in tests and
//! in headless hosts.

mod dataset;
mod document;
mod event;
pub mod selector;

pub use dataset::dataset;
pub use document::{Document, ListenerId, NodeId, NodeKind};
pub use event::{DomEvent, DomListener};
