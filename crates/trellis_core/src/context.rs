//! Shared read-only context
//!
//! A [`Context`] is provided once on a root component and handed by
//! reference to every descendant attached through `set_ref`, so deeply
//! nested components can read application-level data without each level
//! passing it along.
//!
//! ```rust
//! use trellis_core::Context;
//!
//! struct Theme { accent: &'static str }
//!
//! let ctx = Context::new(Theme { accent: "teal" });
//! assert_eq!(ctx.get::<Theme>().map(|t| t.accent), Some("teal"));
//! assert!(ctx.get::<String>().is_none());
//! ```

use std::any::{Any, TypeId};
use std::rc::Rc;

/// Cheaply clonable handle to shared external data
#[derive(Clone)]
pub struct Context {
    data: Rc<dyn Any>,
}

impl Context {
    pub fn new<T: Any>(data: T) -> Self {
        Self {
            data: Rc::new(data),
        }
    }

    /// Wrap data that is already shared
    pub fn from_rc<T: Any>(data: Rc<T>) -> Self {
        Self { data }
    }

    /// Borrow the data as `T`
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.data).type_id() == TypeId::of::<T>()
    }

    /// Whether two handles share the same data
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("refs", &Rc::strong_count(&self.data))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_data() {
        let ctx = Context::new(42u32);
        let other = ctx.clone();
        assert!(ctx.ptr_eq(&other));
        assert!(other.is::<u32>());
        assert_eq!(other.get::<u32>(), Some(&42));
        assert!(!ctx.ptr_eq(&Context::new(42u32)));
    }
}
