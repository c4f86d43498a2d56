//! Error types for the host runtime model
//!
//! Provides:
//! - [`RuntimeError`] for module registry and attribute lookup failures
//! - [`CopyError`] for values that refuse to be deep-copied
//! - [`RaisedError`], the error a callable raises while it runs

use crate::value::Value;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Module registry and attribute lookup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// No module registered under that name
    #[error("no module named '{0}'")]
    ModuleNotFound(String),

    /// A module with that name is already loaded
    #[error("module '{0}' is already loaded")]
    ModuleAlreadyLoaded(String),

    /// Namespace has no slot with that name
    #[error("'{namespace}' has no attribute '{name}'")]
    AttributeNotFound {
        /// Namespace that was searched
        namespace: String,
        /// Missing slot name
        name: String,
    },
}

impl RuntimeError {
    /// Create attribute lookup error
    pub fn attribute_not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Deep copy failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CopyError {
    /// Values of this type have no copy semantics
    #[error("values of type '{0}' cannot be deep-copied")]
    Unsupported(String),
}

/// Error raised by a callable during invocation
///
/// Clones share one instance, so an error recorded by a proxy and the error
/// handed back to the caller are the same object ([`RaisedError::same_instance`]).
#[derive(Clone)]
pub struct RaisedError {
    inner: Arc<RaisedErrorInner>,
}

struct RaisedErrorInner {
    kind: String,
    message: String,
    payload: Option<Value>,
}

impl RaisedError {
    /// Create error of the given kind (type name) with a message
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RaisedErrorInner {
                kind: kind.into(),
                message: message.into(),
                payload: None,
            }),
        }
    }

    /// Create error carrying an arbitrary payload value
    #[must_use]
    pub fn with_payload(
        kind: impl Into<String>,
        message: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            inner: Arc::new(RaisedErrorInner {
                kind: kind.into(),
                message: message.into(),
                payload: Some(payload),
            }),
        }
    }

    /// Argument binding failure
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    /// Unresolvable name
    #[must_use]
    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new("NameError", message)
    }

    /// Error kind (type name)
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    /// Error message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Optional payload
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.inner.payload.as_ref()
    }

    /// Check error kind
    #[inline]
    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.inner.kind == kind
    }

    /// True if both handles refer to the same raised instance
    #[inline]
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for RaisedError {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
            || (self.kind() == other.kind()
                && self.message() == other.message()
                && self.payload() == other.payload())
    }
}

impl Display for RaisedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.kind, self.inner.message)
    }
}

impl Debug for RaisedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaisedError")
            .field("kind", &self.inner.kind)
            .field("message", &self.inner.message)
            .field("payload", &self.inner.payload)
            .finish()
    }
}

impl std::error::Error for RaisedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_instance() {
        let err = RaisedError::new("Exception", "boom");
        let clone = err.clone();
        assert!(err.same_instance(&clone));
        assert!(!err.same_instance(&RaisedError::new("Exception", "boom")));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            RaisedError::new("Exception", "boom"),
            RaisedError::new("Exception", "boom")
        );
        assert_ne!(
            RaisedError::new("Exception", "boom"),
            RaisedError::new("ValueError", "boom")
        );
    }

    #[test]
    fn display_includes_kind() {
        let err = RaisedError::type_error("f() takes 1 positional argument but 2 were given");
        assert_eq!(
            err.to_string(),
            "TypeError: f() takes 1 positional argument but 2 were given"
        );
        assert!(err.is_kind("TypeError"));
    }

    #[test]
    fn attribute_not_found_message() {
        let err = RuntimeError::attribute_not_found("other_package", "missing");
        assert_eq!(err.to_string(), "'other_package' has no attribute 'missing'");
    }
}
