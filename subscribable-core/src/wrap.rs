//! Entry points.
//!
//! [`wrap_value`] wraps a record now. [`wrap_type`] returns a
//! [`Constructor`] that wraps every instance it builds.

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, WrapError, RESERVED_MEMBER};
use crate::observable::Observed;
use crate::options::WrapOptions;
use crate::record::{Fields, Node, Record, Target};

/// Wrap a field record with default options.
pub fn wrap_value(target: Fields) -> Result<Observed> {
    wrap_value_with(target, WrapOptions::default())
}

/// Wrap a field record.
///
/// Fails with [`WrapError::ConflictingMember`] if the record already has a
/// `subscribe` field; nothing is wrapped in that case.
pub fn wrap_value_with(target: Fields, options: WrapOptions) -> Result<Observed> {
    if target.contains_key(RESERVED_MEMBER) {
        return Err(WrapError::conflicting(RESERVED_MEMBER));
    }
    debug!(fields = target.len(), deep = options.deep, "wrapping record");
    Ok(wrap_target(Target::Record(target), options))
}

/// Wrap a JSON object or array with default options.
pub fn wrap_json(target: serde_json::Value) -> Result<Observed> {
    wrap_json_with(target, WrapOptions::default())
}

/// Wrap a JSON object or array.
///
/// Objects go through [`wrap_value_with`]. Arrays become a list-shaped
/// root. Scalars have no fields to observe and are rejected with
/// [`WrapError::InvalidTarget`].
pub fn wrap_json_with(target: serde_json::Value, options: WrapOptions) -> Result<Observed> {
    match target {
        serde_json::Value::Object(fields) => wrap_value_with(fields, options),
        serde_json::Value::Array(items) => {
            debug!(items = items.len(), "wrapping list");
            Ok(wrap_target(Target::List(items), options))
        }
        other => Err(WrapError::InvalidTarget(format!(
            "expected a record or list, got {}",
            kind_of(&other)
        ))),
    }
}

/// Turn a constructor into one whose instances come back wrapped.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize)]
/// struct Point { x: i64, y: i64 }
///
/// let points = wrap_type(|(x, y): (i64, i64)| Point { x, y });
/// let point = points.construct((1, 2))?;
/// point.set("x", 3);
/// ```
pub fn wrap_type<F>(constructor: F) -> Constructor<F> {
    Constructor {
        constructor,
        options: WrapOptions::default(),
    }
}

/// A constructor that wraps each instance at construction time.
///
/// Every call to [`Constructor::construct`] builds an independent wrapped
/// record with its own subscribers.
#[derive(Clone)]
pub struct Constructor<F> {
    constructor: F,
    options: WrapOptions,
}

impl<F> Constructor<F> {
    /// Options applied to every constructed instance.
    pub fn with_options(mut self, options: WrapOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &WrapOptions {
        &self.options
    }

    /// Build one instance from `args` and wrap it.
    ///
    /// The instance is converted to its field record through `Serialize`;
    /// it must serialize to a map or struct.
    pub fn construct<A, T>(&self, args: A) -> Result<Observed>
    where
        F: Fn(A) -> T,
        T: Serialize,
    {
        let instance = (self.constructor)(args);
        let fields = match serde_json::to_value(&instance) {
            Ok(serde_json::Value::Object(fields)) => fields,
            Ok(other) => {
                return Err(WrapError::InvalidTarget(format!(
                    "expected the instance to serialize to a record, got {}",
                    kind_of(&other)
                )))
            }
            Err(err) => return Err(WrapError::InvalidTarget(err.to_string())),
        };
        wrap_value_with(fields, self.options.clone())
    }
}

impl<F> std::fmt::Debug for Constructor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn wrap_target(target: Target, options: WrapOptions) -> Observed {
    Observed::from_root(Record(Node::root(target, options)))
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a record",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Shape, Value};
    use serde_json::json;

    #[derive(Serialize)]
    struct Foo {
        a: i64,
        b: i64,
    }

    impl Foo {
        fn new((a, b): (i64, i64)) -> Self {
            Self { a, b }
        }
    }

    #[test]
    fn conflicting_subscribe_field_fails() {
        let err = wrap_json(json!({ "a": 1, "b": 2, "subscribe": null })).unwrap_err();
        assert_eq!(
            err,
            WrapError::ConflictingMember {
                name: "subscribe".to_string()
            }
        );
    }

    #[test]
    fn nested_subscribe_field_is_allowed() {
        let root = wrap_json(json!({ "inner": { "subscribe": 1 } })).unwrap();
        assert!(root.record("inner").unwrap().contains_key("subscribe"));
    }

    #[test]
    fn wrap_value_keeps_field_order() {
        let mut fields = Fields::new();
        fields.insert("z".into(), json!(1));
        fields.insert("a".into(), json!({ "m": 2 }));

        let root = wrap_value(fields).unwrap();
        assert_eq!(root.keys(), vec!["z", "a"]);
        assert!(root.record("a").is_some());
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(matches!(
            wrap_json(json!(3)),
            Err(WrapError::InvalidTarget(_))
        ));
    }

    #[test]
    fn arrays_wrap_as_lists() {
        let root = wrap_json(json!([1, 2])).unwrap();
        assert_eq!(root.shape(), Shape::List);
        assert_eq!(root.to_json(), json!([1, 2]));
    }

    #[test]
    fn constructor_wraps_each_instance() {
        let foos = wrap_type(Foo::new);
        let first = foos.construct((1, 2)).unwrap();
        let second = foos.construct((3, 4)).unwrap();

        assert_eq!(first.get("a"), Some(Value::from(1)));
        assert_eq!(second.get("b"), Some(Value::from(4)));
        assert!(!first.same_graph(&second));
    }

    #[test]
    fn constructor_rejects_non_record_instances() {
        let numbers = wrap_type(|n: i64| n);
        assert!(matches!(
            numbers.construct(5),
            Err(WrapError::InvalidTarget(_))
        ));
    }

    #[test]
    fn constructor_checks_conflicting_member() {
        #[derive(Serialize)]
        struct Bad {
            subscribe: bool,
        }

        let bad = wrap_type(|_: ()| Bad { subscribe: true });
        assert!(matches!(
            bad.construct(()),
            Err(WrapError::ConflictingMember { .. })
        ));
    }
}
