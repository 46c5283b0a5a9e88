//! Scoped ownership for session resources.
//!
//! Every component that holds an external handle (container reader, codec state,
//! converter state, output stream) implements [`Release`]. The driver keeps each one in
//! a [`Scoped`] wrapper so the handle is released exactly once: either explicitly during
//! teardown, or on drop if teardown never ran.

use std::ops::{Deref, DerefMut};

/// A resource with an explicit release step.
///
/// Implementations must tolerate being called more than once, but [`Scoped`] guarantees
/// they never are.
pub trait Release {
    fn release(&mut self);
}

/// Move-only owner that releases its resource exactly once.
pub struct Scoped<T: Release> {
    inner: T,
    released: bool,
}

impl<T: Release> Scoped<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    /// Release the resource now. Subsequent calls (and drop) are no-ops.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<T: Release> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Release> DerefMut for Scoped<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Release> Drop for Scoped<T> {
    fn drop(&mut self) {
        self.release();
    }
}
