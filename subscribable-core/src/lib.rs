//! Subscribable Core
//!
//! This crate adds change notification to plain mutable records. After
//! wrapping, every write to a field, including fields of records nested
//! arbitrarily deep, synchronously notifies the registered subscribers. The
//! wrapped record also speaks the minimal observable interop protocol, so
//! reactive consumers can adapt it without glue code.
//!
//! # Architecture
//!
//! The crate is organized into three layers plus the entry points:
//!
//! - `record`: the mutation interceptor. Nodes own the real field storage
//!   and report every write.
//! - `registry`: the ordered subscriber list shared by every node of one
//!   wrapped record.
//! - `observable`: the root handle, its `subscribe` method and the
//!   observable interop surface.
//! - `wrap`: `wrap_value` for records, `wrap_type` for constructors.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use subscribable_core::{wrap_json, Observed};
//!
//! let state = wrap_json(json!({ "a": 1, "b": { "c": { "d": { "e": 2 } } } }))?;
//!
//! state.subscribe(|root: &Observed| {
//!     println!("state is now {}", root.to_json());
//! });
//!
//! state.set("a", 3);
//! state.path(&["b", "c", "d"]).unwrap().set("e", 4);
//! // Both writes print the whole state, starting from the root.
//! ```

pub mod error;
pub mod observable;
pub mod options;
pub mod record;
pub mod registry;
pub mod wrap;

pub use error::{Result, WrapError, RESERVED_MEMBER};
pub use observable::{InteropObservable, Observable, Observed, Observer, Subscription};
pub use options::WrapOptions;
pub use record::{Fields, Record, Shape, Value};
pub use registry::{Registry, SlotId, Subscriber, Unsubscribe};
pub use wrap::{wrap_json, wrap_json_with, wrap_type, wrap_value, wrap_value_with, Constructor};
