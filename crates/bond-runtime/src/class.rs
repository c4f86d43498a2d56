//! Class-like objects
//!
//! The engine never looks inside a class directly; it goes through the
//! [`ClassLike`] capability trait. [`ClassObject`] is the stock implementation.

use crate::callable::Callable;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Capability interface of a class-like object
pub trait ClassLike: Send + Sync {
    /// Class name
    fn name(&self) -> &str;

    /// Owning module name
    fn module(&self) -> Option<&str> {
        None
    }

    /// Names of non-callable attributes
    fn list_attributes(&self) -> BTreeSet<String>;

    /// Names of methods
    fn list_methods(&self) -> BTreeSet<String>;

    /// Member by name
    fn get_member(&self, name: &str) -> Option<Value>;
}

/// Shared handle to a class-like object
pub type ClassRef = Arc<dyn ClassLike>;

/// Class with a fixed member table
///
/// Members whose names start with `__` are kept but never listed.
#[derive(Debug)]
pub struct ClassObject {
    name: String,
    module: Option<String>,
    members: IndexMap<String, Value>,
}

impl ClassObject {
    /// Start building a class
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            module: None,
            members: IndexMap::new(),
        }
    }

    /// All members in declaration order, dunder names included
    pub fn members(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn listed(&self, callable: bool) -> BTreeSet<String> {
        self.members
            .iter()
            .filter(|(name, value)| !name.starts_with("__") && value.is_callable() == callable)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl ClassLike for ClassObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    fn list_attributes(&self) -> BTreeSet<String> {
        self.listed(false)
    }

    fn list_methods(&self) -> BTreeSet<String> {
        self.listed(true)
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        self.members.get(name).cloned()
    }
}

/// Builder for [`ClassObject`]
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    module: Option<String>,
    members: IndexMap<String, Value>,
}

impl ClassBuilder {
    /// Owning module
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Owning module, if any
    #[must_use]
    pub fn module_opt(mut self, module: Option<&str>) -> Self {
        self.module = module.map(str::to_string);
        self
    }

    /// Add a member of any kind
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    /// Add a data attribute
    #[must_use]
    pub fn attribute(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, value.into())
    }

    /// Add a method under its own name
    #[must_use]
    pub fn method(self, method: Callable) -> Self {
        let name = method.name().to_string();
        self.member(name, Value::Callable(method))
    }

    /// Finish as a shared class handle
    #[must_use]
    pub fn build(self) -> ClassRef {
        Arc::new(ClassObject {
            name: self.name,
            module: self.module,
            members: self.members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Callable {
        Callable::builder(name).body(|_| Ok(Value::None))
    }

    #[test]
    fn splits_attributes_and_methods() {
        let class = ClassObject::builder("Clock")
            .attribute("resolution", 1)
            .attribute("__doc__", "hidden")
            .method(noop("now"))
            .method(noop("today"))
            .build();

        assert_eq!(
            class.list_attributes(),
            BTreeSet::from(["resolution".to_string()])
        );
        assert_eq!(
            class.list_methods(),
            BTreeSet::from(["now".to_string(), "today".to_string()])
        );
        assert!(class.get_member("__doc__").is_some());
    }

    #[test]
    fn missing_member_is_none() {
        let class = ClassObject::builder("Empty").build();
        assert!(class.get_member("anything").is_none());
        assert!(class.list_methods().is_empty());
    }
}
