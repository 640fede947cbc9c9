//! Protocol Adapter
//!
//! [`Observed`] is the root handle of a wrapped record. Besides field access
//! (it dereferences to [`Record`]) it exposes the two subscription
//! protocols:
//!
//! - [`Observed::subscribe`] registers a plain callback and returns an
//!   [`Unsubscribe`] handle.
//! - [`Observed::observable`] returns an [`Observable`], the interop surface
//!   reactive consumers adapt without knowing anything about records.
//!
//! Neither capability is a field, so `keys`, `values` and `to_json` never
//! see them.

mod interop;

use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::record::Record;
use crate::registry::{Registry, Subscriber, Unsubscribe};

pub use interop::{InteropObservable, Observable, Observer, Subscription};

/// Root handle of a wrapped record.
///
/// This is the value every subscriber receives. It is the live record, not a
/// copy: reading it shows the state right after the triggering write.
#[derive(Clone)]
pub struct Observed {
    record: Record,
}

impl Observed {
    pub(crate) fn from_root(record: Record) -> Self {
        Self { record }
    }

    /// The root record.
    pub fn as_record(&self) -> &Record {
        &self.record
    }

    fn registry(&self) -> &Arc<Registry> {
        &self.record.hub().registry
    }

    /// Register a callback that runs after every write to this record or
    /// any record nested in it.
    ///
    /// The registry keeps the callback alive for as long as the record
    /// lives. A callback that captures a clone of the root therefore keeps
    /// the whole record alive until it is unsubscribed; read the `&Observed`
    /// argument instead.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let state = wrap_json(json!({ "a": 1 }))?;
    /// let unsubscribe = state.subscribe(|root: &Observed| {
    ///     println!("a is now {:?}", root.get("a"));
    /// });
    ///
    /// state.set("a", 2);  // Prints: "a is now Some(Number(2))"
    /// unsubscribe.unsubscribe();
    /// ```
    pub fn subscribe<S>(&self, subscriber: S) -> Unsubscribe
    where
        S: Subscriber + 'static,
    {
        self.subscribe_arc(Arc::new(subscriber))
    }

    /// Register a shared subscriber. Registering the same `Arc` twice
    /// creates two independent slots.
    pub fn subscribe_arc(&self, subscriber: Arc<dyn Subscriber>) -> Unsubscribe {
        let registry = self.registry();
        let slot = registry.add(subscriber);
        Unsubscribe::new(registry, slot)
    }

    /// Number of registered subscribers, interop relays included.
    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    /// Interop factory: a fresh observable over this record.
    pub fn observable(&self) -> Observable {
        Observable::new(self.clone())
    }

    /// Deserialize the current state into a Rust type.
    pub fn snapshot_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.record.to_json())
    }

    /// Whether both handles refer to the same root.
    pub fn ptr_eq(&self, other: &Observed) -> bool {
        self.record.ptr_eq(&other.record)
    }
}

impl Deref for Observed {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl AsRef<Record> for Observed {
    fn as_ref(&self) -> &Record {
        &self.record
    }
}

impl std::fmt::Debug for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observed")
            .field("fields", &self.record.to_json())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
