// Shared Container - Reference-Counted Copy-on-Write Handle
//
// Wraps one primitive container behind an atomic reference count so two
// bitmaps can point at the same payload until one of them mutates. The
// wrapper is transparent to reads and never nests: the inner container is
// always Array, Bitset or Run.

use std::sync::Arc;

use super::Container;

#[derive(Debug, Clone)]
pub(crate) struct SharedContainer {
    inner: Arc<Container>,
}

impl SharedContainer {
    pub(crate) fn new(container: Container) -> Self {
        debug_assert!(!matches!(container, Container::Shared(_)));
        Self {
            inner: Arc::new(container),
        }
    }

    /// Read-through access to the wrapped primitive container.
    pub(crate) fn get(&self) -> &Container {
        &self.inner
    }

    /// Uniquify for mutation: take the inner container when this handle is
    /// the last sharer, otherwise deep-clone it and leave the other sharers
    /// untouched.
    pub(crate) fn into_writable(self) -> Container {
        match Arc::try_unwrap(self.inner) {
            Ok(container) => container,
            Err(shared) => (*shared).clone(),
        }
    }

    /// Number of bitmaps currently sharing the payload (diagnostics).
    pub(crate) fn sharer_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
