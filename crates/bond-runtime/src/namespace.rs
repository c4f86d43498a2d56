//! Namespaces
//!
//! A [`Namespace`] is a named, ordered table of slots. Module namespaces carry
//! [`ModuleMetadata`]; plain scopes (object dicts, ad-hoc environments) do not.
//! The distinction matters to anything that rewrites bindings: only slots of
//! module namespaces are bindings in the import sense.

use crate::error::RuntimeError;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Shared handle to a namespace
pub type NamespaceRef = Arc<Namespace>;

/// Loader information carried by module namespaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetadata {
    /// Component that loaded the module
    pub loader: String,
    /// Source file, if the module came from one
    pub file: Option<String>,
}

impl ModuleMetadata {
    /// Metadata with a loader name only
    #[must_use]
    pub fn new(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            file: None,
        }
    }

    /// With source file
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Named slot table
pub struct Namespace {
    name: String,
    metadata: Option<ModuleMetadata>,
    slots: RwLock<IndexMap<String, Value>>,
}

impl Namespace {
    /// Create a module namespace
    #[must_use]
    pub fn module(name: impl Into<String>, metadata: ModuleMetadata) -> NamespaceRef {
        Arc::new(Self {
            name: name.into(),
            metadata: Some(metadata),
            slots: RwLock::new(IndexMap::new()),
        })
    }

    /// Create a plain scope (no module metadata)
    #[must_use]
    pub fn scope(name: impl Into<String>) -> NamespaceRef {
        Arc::new(Self {
            name: name.into(),
            metadata: None,
            slots: RwLock::new(IndexMap::new()),
        })
    }

    /// Namespace name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module metadata, if this is a module
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.metadata.as_ref()
    }

    /// True for module namespaces
    #[inline]
    #[must_use]
    pub fn is_module(&self) -> bool {
        self.metadata.is_some()
    }

    /// Value in slot
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.slots.read().get(name).cloned()
    }

    /// Value in slot, or an attribute error
    ///
    /// # Errors
    /// Returns [`RuntimeError::AttributeNotFound`] if the slot is empty.
    pub fn try_get(&self, name: &str) -> Result<Value, RuntimeError> {
        self.get(name)
            .ok_or_else(|| RuntimeError::attribute_not_found(&self.name, name))
    }

    /// Bind slot, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.slots.write().insert(name.into(), value.into())
    }

    /// Unbind slot
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.slots.write().shift_remove(name)
    }

    /// Check if slot is bound
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Slot names in binding order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Snapshot of all slots
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.slots
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Names of slots currently holding `target` by identity
    #[must_use]
    pub fn bindings_of(&self, target: &Value) -> Vec<String> {
        self.slots
            .read()
            .iter()
            .filter(|(_, v)| v.is_identical(target))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl Debug for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("slots", &self.keys())
            .finish()
    }
}
