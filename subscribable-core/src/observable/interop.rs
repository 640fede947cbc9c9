//! Observable interop.
//!
//! Follows the minimal observable contract reactive libraries agree on:
//! an observable has `subscribe(observer) -> subscription`, the subscription
//! has `unsubscribe()`, and asking an observable for its observable returns
//! itself. Anything that accepts [`InteropObservable`] can consume a wrapped
//! record without adapter code.

use std::sync::Arc;

use tracing::debug;

use super::Observed;
use crate::error::{Result, WrapError};
use crate::registry::{Subscriber, Unsubscribe};

/// Consumer side of the interop protocol.
///
/// `next` is optional; an observer that does not override it is still a
/// valid observer and simply ignores every value.
pub trait Observer: Send + Sync {
    fn next(&self, value: &Observed) {
        let _ = value;
    }
}

/// The empty observer, the equivalent of subscribing with `{}`.
impl Observer for () {}

/// Source side of the interop protocol.
pub trait InteropObservable {
    /// Return the observable for this source.
    fn observable(&self) -> Observable;
}

struct Inner {
    root: Observed,
}

/// Observable over a wrapped record.
///
/// Obtained from [`Observed::observable`]. Clones share identity, and
/// [`Observable::observable`] returns an observable identical to `self`.
#[derive(Clone)]
pub struct Observable {
    inner: Arc<Inner>,
}

impl Observable {
    pub(crate) fn new(root: Observed) -> Self {
        Self {
            inner: Arc::new(Inner { root }),
        }
    }

    /// Subscribe an observer.
    ///
    /// The observer receives the current state once before this returns,
    /// then once after every write, until the subscription is closed.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer + 'static,
    {
        self.subscribe_observer(Arc::new(observer))
    }

    /// Subscribe an observer supplied at runtime.
    ///
    /// Fails with [`WrapError::InvalidObserver`] when no observer is given.
    pub fn subscribe_dyn(&self, observer: Option<Arc<dyn Observer>>) -> Result<Subscription> {
        let observer = observer.ok_or(WrapError::InvalidObserver)?;
        Ok(self.subscribe_observer(observer))
    }

    fn subscribe_observer(&self, observer: Arc<dyn Observer>) -> Subscription {
        let root = &self.inner.root;
        observer.next(root);
        let unsubscribe = root.subscribe(Relay { observer });
        debug!(slot = unsubscribe.slot().raw(), "observer subscribed");
        Subscription { unsubscribe }
    }

    /// Interop self-identity: the observable of an observable is itself.
    pub fn observable(&self) -> Observable {
        self.clone()
    }

    /// The record this observable reports on.
    pub fn root(&self) -> &Observed {
        &self.inner.root
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl InteropObservable for Observable {
    fn observable(&self) -> Observable {
        self.clone()
    }
}

impl InteropObservable for Observed {
    fn observable(&self) -> Observable {
        Observable::new(self.clone())
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("root", &self.inner.root)
            .finish()
    }
}

/// Registry subscriber that forwards every notification to one observer.
struct Relay {
    observer: Arc<dyn Observer>,
}

impl Subscriber for Relay {
    fn notify(&self, root: &Observed) {
        self.observer.next(root);
    }
}

/// Handle returned by [`Observable::subscribe`].
///
/// Closing is terminal and idempotent. Dropping the handle leaves the
/// observer subscribed.
#[derive(Debug, Clone)]
pub struct Subscription {
    unsubscribe: Unsubscribe,
}

impl Subscription {
    /// Stop delivering values to the observer.
    pub fn unsubscribe(&self) {
        self.unsubscribe.unsubscribe();
    }

    pub fn is_closed(&self) -> bool {
        !self.unsubscribe.is_subscribed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrap::wrap_json;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<serde_json::Value>>,
    }

    impl Observer for Recorder {
        fn next(&self, value: &Observed) {
            self.seen.lock().push(value.to_json());
        }
    }

    #[test]
    fn delivers_current_state_immediately() {
        let root = wrap_json(json!({ "a": 1, "b": 2 })).unwrap();
        let recorder = Arc::new(Recorder::default());

        let observer: Arc<dyn Observer> = recorder.clone();
        let _sub = root.observable().subscribe_dyn(Some(observer)).unwrap();

        assert_eq!(*recorder.seen.lock(), vec![json!({ "a": 1, "b": 2 })]);
    }

    #[test]
    fn missing_observer_is_rejected() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let err = root.observable().subscribe_dyn(None).unwrap_err();
        assert_eq!(err, WrapError::InvalidObserver);
        assert_eq!(root.subscriber_count(), 0);
    }

    #[test]
    fn empty_observer_is_accepted() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let sub = root.observable().subscribe(());
        assert!(!sub.is_closed());

        root.set("a", 2);
        sub.unsubscribe();
        assert!(sub.is_closed());
    }

    #[test]
    fn observable_of_observable_is_itself() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let obs = root.observable();
        assert!(obs.observable().ptr_eq(&obs));
        assert!(InteropObservable::observable(&obs).ptr_eq(&obs));
        assert!(obs.root().ptr_eq(&root));
    }

    #[test]
    fn unsubscribe_is_terminal_and_idempotent() {
        let root = wrap_json(json!({ "a": 1 })).unwrap();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn Observer> = recorder.clone();
        let sub = root.observable().subscribe_dyn(Some(observer)).unwrap();

        sub.unsubscribe();
        sub.unsubscribe();
        root.set("a", 2);

        assert_eq!(recorder.seen.lock().len(), 1);
        assert_eq!(root.subscriber_count(), 0);
    }
}
