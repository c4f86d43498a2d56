//! Error types for bond
//!
//! Provides error handling for:
//! - Incompatible replacements under strict mode
//! - Unsupported target and replacement kinds
//! - Callables whose signature cannot be introspected
//! - Queries against callables that were never instrumented
//! - Targets that cannot be resolved in the runtime

use bond_runtime::RuntimeError;
use std::collections::BTreeSet;

/// Main bond error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BondError {
    /// Replacement callable has a different calling convention
    #[error("Stub does not match the signature of {name}.")]
    IncompatibleSignature {
        /// Name of the original callable
        name: String,
    },

    /// Replacement method has a different calling convention
    #[error(
        "Stub method {stub}.{method} does not match the signature of the original \
         {class}.{method} class method. Please ensure the implementation of the \
         provided stub matches that of the original class, or set the 'strict' \
         option to False."
    )]
    IncompatibleMethodSignature {
        /// Original class name
        class: String,
        /// Replacement class name
        stub: String,
        /// Method name
        method: String,
    },

    /// Non-callable attribute sets differ
    #[error(
        "Stub object '{stub}' does not have the same set of attributes as the \
         original '{class}' class. Please ensure the implementation of the provided \
         stub matches that of the original class, or set the 'strict' option to \
         False.\nOriginal: {original:?}\nProvided: {provided:?}"
    )]
    IncompatibleAttributes {
        /// Original class name
        class: String,
        /// Replacement class name
        stub: String,
        /// Attributes of the original
        original: BTreeSet<String>,
        /// Attributes of the replacement
        provided: BTreeSet<String>,
    },

    /// Method sets differ
    #[error(
        "Stub object '{stub}' does not have the same set of methods as the original \
         '{class}' class. Please ensure the implementation of the provided stub \
         matches that of the original class, or set the 'strict' option to False.\n\
         Original: {original:?}\nProvided: {provided:?}\n\
         Missing: {missing:?}\nUnexpected: {unexpected:?}"
    )]
    IncompatibleMethods {
        /// Original class name
        class: String,
        /// Replacement class name
        stub: String,
        /// Methods of the original
        original: BTreeSet<String>,
        /// Methods of the replacement
        provided: BTreeSet<String>,
        /// On the original only
        missing: BTreeSet<String>,
        /// On the replacement only
        unexpected: BTreeSet<String>,
    },

    /// A callable can only be replaced by a callable
    #[error("bond expected a Callable type to replace {name}, got '{found}'.")]
    ExpectedCallable {
        /// Name of the original callable
        name: String,
        /// Type of the offered replacement
        found: String,
    },

    /// A class can only be replaced by a class-like object
    #[error("bond expected a class-like object to replace {name}, got '{found}'.")]
    ExpectedClass {
        /// Name of the original class
        name: String,
        /// Type of the offered replacement
        found: String,
    },

    /// Target is neither callable nor class-like
    #[error("Object of type '{type_name}' is not supported by bond.")]
    UnsupportedTarget {
        /// Type of the target
        type_name: String,
    },

    /// Calling convention cannot be determined
    #[error("unsupported callable: {name}")]
    Uninspectable {
        /// Qualified name of the callable
        name: String,
    },

    /// Query against something that was never wrapped
    #[error(
        "The argument is not a spied function. Calls of an unspied function are not \
         tracked and are therefore not known."
    )]
    NotInstrumented,

    /// Target could not be resolved
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl BondError {
    /// Create method-set mismatch error, computing both differences
    #[must_use]
    pub fn incompatible_methods(
        class: impl Into<String>,
        stub: impl Into<String>,
        original: BTreeSet<String>,
        provided: BTreeSet<String>,
    ) -> Self {
        let missing = original.difference(&provided).cloned().collect();
        let unexpected = provided.difference(&original).cloned().collect();
        Self::IncompatibleMethods {
            class: class.into(),
            stub: stub.into(),
            original,
            provided,
            missing,
            unexpected,
        }
    }

    /// Replacement failed a strict compatibility check
    #[inline]
    #[must_use]
    pub fn is_incompatibility(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleSignature { .. }
                | Self::IncompatibleMethodSignature { .. }
                | Self::IncompatibleAttributes { .. }
                | Self::IncompatibleMethods { .. }
        )
    }

    /// Error raised while installing a session (as opposed to querying one)
    #[inline]
    #[must_use]
    pub fn is_install_error(&self) -> bool {
        !matches!(self, Self::NotInstrumented)
    }
}
