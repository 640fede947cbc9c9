//! Error types for wrapping and subscribing.

use thiserror::Error;

/// Name of the capability installed on every wrapped record.
///
/// A target that already carries a field under this name cannot be wrapped.
pub const RESERVED_MEMBER: &str = "subscribe";

/// Errors raised while wrapping a target or subscribing an observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapError {
    /// The target already exposes a field under a reserved capability name.
    #[error("a `{name}` member is already present on the target")]
    ConflictingMember { name: String },

    /// The observable interop `subscribe` was called without an observer.
    #[error("expected the observer to be an object")]
    InvalidObserver,

    /// A constructed instance could not be turned into a field record.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl WrapError {
    pub(crate) fn conflicting(name: &str) -> Self {
        Self::ConflictingMember {
            name: name.to_string(),
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, WrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_member_names_the_field() {
        let err = WrapError::conflicting(RESERVED_MEMBER);
        assert_eq!(
            err.to_string(),
            "a `subscribe` member is already present on the target"
        );
    }

    #[test]
    fn invalid_observer_message() {
        assert_eq!(
            WrapError::InvalidObserver.to_string(),
            "expected the observer to be an object"
        );
    }
}
