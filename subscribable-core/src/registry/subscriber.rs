//! Subscriber types for the registry.
//!
//! A Subscriber is anything that wants to hear about writes to a wrapped
//! record. Plain closures qualify; so does the relay the observable adapter
//! installs for each interop observer.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observable::Observed;

/// Identifier of one registration slot.
///
/// Every call to `subscribe` gets a fresh slot, even when the same callback
/// is registered twice, so each registration can be removed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    /// Generate a new unique slot ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives the root of a wrapped record after every write.
///
/// The argument is the live root, not a copy: reading it shows the state
/// right after the write, and writing to it re-enters notification.
pub trait Subscriber: Send + Sync {
    fn notify(&self, root: &Observed);
}

impl<F> Subscriber for F
where
    F: Fn(&Observed) + Send + Sync,
{
    fn notify(&self, root: &Observed) {
        self(root)
    }
}
