//! Subscription Registry
//!
//! The registry owns the ordered list of subscribers of one wrapped record.
//! Every node of the record, however deep, notifies through the same
//! registry, so a subscriber sees top-level and nested writes alike.
//!
//! # Ordering
//!
//! Subscribers are called in the order they were added. Each registration
//! gets its own [`SlotId`]; removing one slot never affects another, even if
//! both slots hold the same callback.
//!
//! # Re-entrancy
//!
//! A notification pass first copies the current list, then releases the
//! lock and calls each subscriber. Subscribers may therefore read, write,
//! subscribe and unsubscribe from inside a callback. Changes to the list made
//! during a pass take effect on the next pass: everyone registered when the
//! pass started is called exactly once.
//!
//! # Depth
//!
//! Nested passes are counted per thread, so the optional depth limit only
//! sees recursion caused by the calling thread's own subscribers. Writes
//! from other threads run their own passes at their own depth.

mod subscriber;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::observable::Observed;

pub use subscriber::{SlotId, Subscriber};

/// Inline capacity of the per-pass subscriber copy.
const INLINE_SUBSCRIBERS: usize = 4;

type Slots = Vec<(SlotId, Arc<dyn Subscriber>)>;

thread_local! {
    /// Passes running on this thread, keyed by registry address.
    static PASS_DEPTH: RefCell<HashMap<usize, usize>> = RefCell::new(HashMap::new());
}

/// Ordered set of subscribers shared by every node of one wrapped record.
pub struct Registry {
    slots: RwLock<Slots>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Append a subscriber and return the slot it occupies.
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) -> SlotId {
        let id = SlotId::new();
        let mut slots = self.slots.write();
        slots.push((id, subscriber));
        debug!(slot = id.raw(), subscribers = slots.len(), "subscribed");
        id
    }

    /// Remove one slot. Returns `false` if it was already gone.
    pub fn remove(&self, id: SlotId) -> bool {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|(slot, _)| *slot != id);
        let removed = slots.len() != before;
        if removed {
            debug!(slot = id.raw(), subscribers = slots.len(), "unsubscribed");
        }
        removed
    }

    /// Whether the slot is still registered.
    pub fn contains(&self, id: SlotId) -> bool {
        self.slots.read().iter().any(|(slot, _)| *slot == id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Number of this registry's notification passes on the calling
    /// thread's stack.
    pub fn pass_depth(&self) -> usize {
        let key = self.key();
        PASS_DEPTH.with(|depth| depth.borrow().get(&key).copied().unwrap_or(0))
    }

    fn key(&self) -> usize {
        self as *const Registry as usize
    }

    fn snapshot(&self) -> SmallVec<[Arc<dyn Subscriber>; INLINE_SUBSCRIBERS]> {
        self.slots
            .read()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect()
    }

    /// Call every current subscriber with `root`, in insertion order.
    ///
    /// `key` is only used for diagnostics.
    pub(crate) fn dispatch(&self, root: &Observed, key: &str, max_depth: Option<usize>) {
        let depth = self.pass_depth();
        if let Some(limit) = max_depth {
            if depth >= limit {
                warn!(key, depth, limit, "notification depth limit reached, skipping pass");
                return;
            }
        }

        let subscribers = self.snapshot();
        if subscribers.is_empty() {
            return;
        }
        trace!(key, subscribers = subscribers.len(), depth, "notify");

        let _pass = PassGuard::enter(self);
        for subscriber in &subscribers {
            subscriber.notify(root);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("subscribers", &self.len())
            .field("pass_depth", &self.pass_depth())
            .finish()
    }
}

/// Leaves the pass when dropped, even if a subscriber panics.
struct PassGuard {
    key: usize,
}

impl PassGuard {
    fn enter(registry: &Registry) -> Self {
        let key = registry.key();
        PASS_DEPTH.with(|depth| *depth.borrow_mut().entry(key).or_insert(0) += 1);
        Self { key }
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        let _ = PASS_DEPTH.try_with(|depth| {
            let mut depth = depth.borrow_mut();
            if let Some(count) = depth.get_mut(&self.key) {
                *count -= 1;
                if *count == 0 {
                    depth.remove(&self.key);
                }
            }
        });
    }
}

/// Handle returned by `subscribe`; removes exactly one registration.
///
/// Calling [`Unsubscribe::unsubscribe`] more than once is harmless. Dropping
/// the handle does not unsubscribe. The handle does not keep the record
/// alive.
#[derive(Clone)]
pub struct Unsubscribe {
    registry: Weak<Registry>,
    slot: SlotId,
}

impl Unsubscribe {
    pub(crate) fn new(registry: &Arc<Registry>, slot: SlotId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            slot,
        }
    }

    /// Remove the registration. Returns `true` only on the call that
    /// actually removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.slot),
            None => false,
        }
    }

    /// Whether the registration is still live.
    pub fn is_subscribed(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.contains(self.slot))
            .unwrap_or(false)
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("slot", &self.slot)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrap::wrap_json;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn Subscriber>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let subscriber: Arc<dyn Subscriber> = Arc::new(move |_: &Observed| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscriber)
    }

    #[test]
    fn add_and_remove_slots() {
        let registry = Registry::new();
        let (_, subscriber) = counter();

        let first = registry.add(subscriber.clone());
        let second = registry.add(subscriber);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(first));
        assert!(!registry.remove(first));
        assert!(registry.contains(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dispatch_calls_in_insertion_order() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let registry = Registry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in 0..3 {
            let order = order.clone();
            registry.add(Arc::new(move |_: &Observed| order.lock().push(tag)));
        }

        registry.dispatch(&root, "a", None);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn dispatch_respects_depth_limit() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let registry = Registry::new();
        let (count, subscriber) = counter();
        registry.add(subscriber);

        registry.dispatch(&root, "a", Some(0));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        registry.dispatch(&root, "a", Some(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pass_depth(), 0);
    }

    #[test]
    fn depth_is_counted_per_thread() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let registry = Arc::new(Registry::new());
        let (count, subscriber) = counter();
        registry.add(subscriber);

        let weak = Arc::downgrade(&registry);
        let spawned = Arc::new(AtomicBool::new(false));
        registry.add(Arc::new(move |root: &Observed| {
            let Some(registry) = weak.upgrade() else {
                return;
            };
            assert_eq!(registry.pass_depth(), 1);
            if spawned.swap(true, Ordering::SeqCst) {
                return;
            }
            let root = root.clone();
            let writer = std::thread::spawn(move || {
                assert_eq!(registry.pass_depth(), 0);
                registry.dispatch(&root, "a", Some(1));
            });
            assert!(writer.join().is_ok());
        }));

        registry.dispatch(&root, "a", Some(1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(registry.pass_depth(), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = Arc::new(Registry::new());
        let (_, subscriber) = counter();
        let slot = registry.add(subscriber);
        let handle = Unsubscribe::new(&registry, slot);

        assert!(handle.is_subscribed());
        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        assert!(!handle.is_subscribed());
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry = Arc::new(Registry::new());
        let (_, subscriber) = counter();
        let handle = Unsubscribe::new(&registry, registry.add(subscriber));

        drop(registry);
        assert!(!handle.unsubscribe());
        assert!(!handle.is_subscribed());
    }
}
