//! Mutation Interceptor
//!
//! A [`Record`] is a handle to one node of a wrapped object graph. It owns
//! the real field storage; reads pass straight through and every write is
//! stored first, then reported to the shared registry.
//!
//! # How Interception Works
//!
//! 1. At wrap time the target is walked depth-first. Each nested record (and
//!    list, unless disabled) becomes its own node, built before the node that
//!    contains it.
//!
//! 2. Every node holds the same hub: the registry plus a weak pointer to
//!    the root node.
//!
//! 3. A write on any node stores the value, upgrades the root and hands it to
//!    the registry, which calls each subscriber with the root.
//!
//! # Scope
//!
//! Deep wrapping is a one-time pass. A record or list assigned with
//! [`Record::set`] after wrapping is stored [`Value::Detached`]; only the
//! field slot itself is observed. [`Record::attach`] wraps new structure into
//! the same hub explicitly.
//!
//! The graph stays a tree of nodes sharing one hub. A [`Value::Record`]
//! handed to `set` is stored live only if it belongs to this graph and does
//! not already contain the node being written; otherwise its current state
//! is stored detached.

mod value;

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::RESERVED_MEMBER;
use crate::observable::Observed;
use crate::options::WrapOptions;
use crate::registry::Registry;

pub use value::Value;

/// Plain field record accepted as a wrap target.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A value accepted as the root of a wrapped graph.
pub(crate) enum Target {
    Record(Fields),
    List(Vec<serde_json::Value>),
}

/// Whether a node came from a record or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Record,
    /// Keys are the decimal indices `"0"`, `"1"`, ...
    List,
}

/// State shared by every node of one wrapped graph.
pub(crate) struct Hub {
    pub(crate) registry: Arc<Registry>,
    root: Weak<Node>,
    pub(crate) options: WrapOptions,
}

impl Hub {
    fn notify(&self, key: &str) {
        match self.root.upgrade() {
            Some(root) => {
                let root = Observed::from_root(Record(root));
                self.registry
                    .dispatch(&root, key, self.options.max_notify_depth);
            }
            None => trace!(key, "root dropped, write not reported"),
        }
    }
}

pub(crate) struct Node {
    shape: Shape,
    fields: RwLock<IndexMap<String, Value>>,
    hub: Arc<Hub>,
}

impl Node {
    /// Build a root node and every nested node beneath it.
    pub(crate) fn root(target: Target, options: WrapOptions) -> Arc<Node> {
        Arc::new_cyclic(|root| {
            let hub = Arc::new(Hub {
                registry: Arc::new(Registry::new()),
                root: root.clone(),
                options,
            });
            let (shape, fields) = match target {
                Target::Record(map) => (Shape::Record, wrap_fields(map, &hub)),
                Target::List(items) => (Shape::List, wrap_items(items, &hub)),
            };
            Node {
                shape,
                fields: RwLock::new(fields),
                hub,
            }
        })
    }

    fn nested(shape: Shape, fields: IndexMap<String, Value>, hub: &Arc<Hub>) -> Arc<Node> {
        Arc::new(Node {
            shape,
            fields: RwLock::new(fields),
            hub: Arc::clone(hub),
        })
    }
}

/// Children first, so a node is never built before its descendants.
fn wrap_value(value: serde_json::Value, hub: &Arc<Hub>) -> Value {
    match value {
        serde_json::Value::Object(map) if hub.options.deep => {
            let fields = wrap_fields(map, hub);
            Value::Record(Record(Node::nested(Shape::Record, fields, hub)))
        }
        serde_json::Value::Array(items) if hub.options.deep && hub.options.wrap_lists => {
            let fields = wrap_items(items, hub);
            Value::Record(Record(Node::nested(Shape::List, fields, hub)))
        }
        other => Value::from(other),
    }
}

fn wrap_fields(map: Fields, hub: &Arc<Hub>) -> IndexMap<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key, wrap_value(value, hub)))
        .collect()
}

fn wrap_items(items: Vec<serde_json::Value>, hub: &Arc<Hub>) -> IndexMap<String, Value> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, value)| (index.to_string(), wrap_value(value, hub)))
        .collect()
}

/// Handle to one node of a wrapped record.
///
/// Cloning the handle is cheap and shares the node. Writes through any
/// handle, root or nested, notify the subscribers of the root.
#[derive(Clone)]
pub struct Record(pub(crate) Arc<Node>);

impl Record {
    /// Current value of a field.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.fields.read().get(key).cloned()
    }

    /// Nested record stored under `key`, if any.
    pub fn record(&self, key: &str) -> Option<Record> {
        match self.get(key)? {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Walk a chain of keys through nested records.
    pub fn path(&self, keys: &[&str]) -> Option<Record> {
        keys.iter()
            .try_fold(self.clone(), |record, key| record.record(key))
    }

    /// Store `value` under `key`, then notify every subscriber of the root.
    ///
    /// An existing key keeps its position; a new key is appended.
    ///
    /// A record from another graph, or one that contains this node, is
    /// stored as a [`Value::Detached`] copy of its current state. Writing
    /// the reserved `subscribe` name on the root is ignored and notifies
    /// nobody.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key == RESERVED_MEMBER && self.is_root() {
            debug!(key = key.as_str(), "reserved member, write ignored");
            return;
        }
        let value = self.adopt(value.into());
        trace!(key = key.as_str(), "write");
        self.0.fields.write().insert(key.clone(), value);
        self.0.hub.notify(&key);
    }

    /// Replace a field with a value computed from its current value.
    ///
    /// Produces a single notification.
    pub fn update<F, V>(&self, key: impl Into<String>, f: F)
    where
        F: FnOnce(Option<Value>) -> V,
        V: Into<Value>,
    {
        let key = key.into();
        let current = self.get(&key);
        self.set(key, f(current));
    }

    /// Wrap `fields` into this graph and store it under `key`.
    ///
    /// Unlike [`Record::set`], writes inside the attached record are
    /// observed. Returns the new nested record, which is left unstored when
    /// `key` is the reserved name on the root.
    pub fn attach(&self, key: impl Into<String>, fields: Fields) -> Record {
        let hub = &self.0.hub;
        let nested = Record(Node::nested(Shape::Record, wrap_fields(fields, hub), hub));
        self.set(key, Value::Record(nested.clone()));
        nested
    }

    /// Append to a list-shaped node. Returns `false`, without writing, on a
    /// record-shaped node.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        if self.0.shape != Shape::List {
            return false;
        }
        let index = self.len();
        self.set(index.to_string(), value);
        true
    }

    pub fn shape(&self) -> Shape {
        self.0.shape
    }

    pub fn is_list(&self) -> bool {
        self.0.shape == Shape::List
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.read().contains_key(key)
    }

    /// Field names in enumeration order.
    pub fn keys(&self) -> Vec<String> {
        self.0.fields.read().keys().cloned().collect()
    }

    /// Field values in enumeration order.
    pub fn values(&self) -> Vec<Value> {
        self.0.fields.read().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .fields
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.read().is_empty()
    }

    /// Plain JSON copy of the current state.
    pub fn to_json(&self) -> serde_json::Value {
        let fields = self.entries();
        match self.0.shape {
            Shape::Record => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json()))
                    .collect(),
            ),
            Shape::List => serde_json::Value::Array(
                fields.into_iter().map(|(_, value)| value.to_json()).collect(),
            ),
        }
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether both handles belong to the same wrapped graph.
    pub fn same_graph(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.0.hub, &other.0.hub)
    }

    pub(crate) fn hub(&self) -> &Arc<Hub> {
        &self.0.hub
    }

    fn is_root(&self) -> bool {
        std::ptr::eq(self.0.hub.root.as_ptr(), Arc::as_ptr(&self.0))
    }

    /// Whether `target` is this node or any node nested beneath it.
    fn reaches(&self, target: &Record) -> bool {
        let mut pending = vec![self.clone()];
        while let Some(record) = pending.pop() {
            if record.ptr_eq(target) {
                return true;
            }
            pending.extend(record.values().into_iter().filter_map(|value| match value {
                Value::Record(nested) => Some(nested),
                _ => None,
            }));
        }
        false
    }

    /// Keep a value about to be stored under this node inside the graph and
    /// free of cycles.
    fn adopt(&self, value: Value) -> Value {
        match value {
            Value::Record(record) if !record.same_graph(self) || record.reaches(self) => {
                debug!(shape = ?record.shape(), "record detached on write");
                Value::Detached(record.to_json())
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("shape", &self.0.shape)
            .field("fields", &self.to_json())
            .finish()
    }
}
