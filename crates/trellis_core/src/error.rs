//! Error types

use thiserror::Error;

/// Errors raised by document operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node id does not belong to this document (or was removed)
    #[error("unknown node")]
    UnknownNode,

    /// `replace_child`/`remove_child` called with a node that is not a child
    #[error("node is not a child of the given parent")]
    NotAChild,

    /// Appending would make a node its own ancestor
    #[error("cannot insert a node into its own subtree")]
    Hierarchy,

    /// Selector failed to parse
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Component configuration and lifecycle errors
#[derive(Error, Debug)]
pub enum ComponentError {
    /// `mount` called on a component that already has a root element
    #[error("component is already mounted")]
    AlreadyMounted,

    /// `mount` called on a detached component
    #[error("detached components cannot be mounted")]
    DetachedMount,

    /// `init` called on a DOM-bearing component without a root element
    #[error("component must be mounted before init")]
    NotMounted,

    /// Reference descriptor without an id
    #[error("reference id is required")]
    MissingRefId,

    /// DOM-bearing reference without a root element to mount on
    #[error("reference `{0}` has no root element to mount on")]
    MissingRoot(String),

    /// DOM-bearing reference under an ancestor chain with no root element
    #[error("reference `{0}` needs a DOM anchor but no ancestor is mounted")]
    NoDomAnchor(String),

    /// `destroy_ref` with an id that is not registered
    #[error("unknown reference `{0}`")]
    UnknownRef(String),

    /// A listener or action names a method the behavior does not provide
    #[error("`{method}` is not a method of {component}")]
    UnknownMethod { component: String, method: String },

    /// Document operation failed
    #[error(transparent)]
    Dom(#[from] DomError),

    /// A user hook reported a failure
    #[error("{hook} failed: {message}")]
    Hook { hook: &'static str, message: String },
}

impl ComponentError {
    /// Failure reported from inside a lifecycle hook
    pub fn hook(hook: &'static str, message: impl Into<String>) -> Self {
        ComponentError::Hook {
            hook,
            message: message.into(),
        }
    }
}

/// Result type for component operations
pub type Result<T> = std::result::Result<T, ComponentError>;
