//! Live object registry and reference walk
//!
//! Provides [`Runtime`], the registry of loaded modules, and the
//! [`HeapIntrospection`] capability it implements: a reachability pass plus a
//! "who refers to this object" query over everything reachable from the loaded
//! modules and live scopes.

use crate::class::ClassRef;
use crate::error::RuntimeError;
use crate::namespace::{ModuleMetadata, Namespace, NamespaceRef};
use crate::value::{Dict, List, Value};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Loader name recorded on modules the runtime defines itself
pub const RUNTIME_LOADER: &str = "bond_runtime::Runtime";

/// Container found holding a reference
#[derive(Clone)]
pub enum Referrer {
    /// Module or scope namespace
    Namespace(NamespaceRef),
    /// List element
    List(List),
    /// Dict entry
    Dict(Dict),
    /// Class member
    Class(ClassRef),
}

impl Referrer {
    /// The namespace, if this referrer is a module namespace
    #[must_use]
    pub fn as_module(&self) -> Option<&NamespaceRef> {
        match self {
            Self::Namespace(ns) if ns.is_module() => Some(ns),
            _ => None,
        }
    }

    /// Short kind label for diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Namespace(ns) if ns.is_module() => "module",
            Self::Namespace(_) => "scope",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Class(_) => "class",
        }
    }
}

impl std::fmt::Debug for Referrer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespace(ns) => write!(f, "Referrer::{}({})", self.kind(), ns.name()),
            Self::Class(class) => write!(f, "Referrer::class({})", class.name()),
            _ => write!(f, "Referrer::{}", self.kind()),
        }
    }
}

/// Live-object capability the host supplies to the instrumentation engine
pub trait HeapIntrospection: Send + Sync {
    /// Reachability pass; returns how many dead entries were reclaimed
    fn collect(&self) -> usize;

    /// Every live container holding `target` by identity
    fn referrers(&self, target: &Value) -> Vec<Referrer>;

    /// Loaded module by name
    fn module(&self, name: &str) -> Option<NamespaceRef>;
}

/// Registry of loaded modules and tracked scopes
///
/// Modules are held strongly until unloaded. Scopes are tracked weakly: they
/// stay visible to [`HeapIntrospection::referrers`] exactly as long as someone
/// else keeps them alive.
#[derive(Debug, Default)]
pub struct Runtime {
    modules: DashMap<String, NamespaceRef>,
    scopes: Mutex<Vec<Weak<Namespace>>>,
}

impl Runtime {
    /// Create empty runtime
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and load a module
    ///
    /// # Errors
    /// Returns [`RuntimeError::ModuleAlreadyLoaded`] if the name is taken.
    pub fn define_module(&self, name: &str) -> Result<NamespaceRef, RuntimeError> {
        self.define_module_with(name, ModuleMetadata::new(RUNTIME_LOADER))
    }

    /// Create and load a module with explicit metadata
    ///
    /// # Errors
    /// Returns [`RuntimeError::ModuleAlreadyLoaded`] if the name is taken.
    pub fn define_module_with(
        &self,
        name: &str,
        metadata: ModuleMetadata,
    ) -> Result<NamespaceRef, RuntimeError> {
        use dashmap::mapref::entry::Entry;

        match self.modules.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RuntimeError::ModuleAlreadyLoaded(name.to_string())),
            Entry::Vacant(slot) => {
                let module = Namespace::module(name, metadata);
                slot.insert(Arc::clone(&module));
                tracing::debug!(module = name, "module loaded");
                Ok(module)
            }
        }
    }

    /// Look up a loaded module
    ///
    /// # Errors
    /// Returns [`RuntimeError::ModuleNotFound`] if nothing is loaded under `name`.
    pub fn import(&self, name: &str) -> Result<NamespaceRef, RuntimeError> {
        self.modules
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))
    }

    /// Remove a module from the registry
    pub fn unload(&self, name: &str) -> Option<NamespaceRef> {
        self.modules.remove(name).map(|(_, module)| module)
    }

    /// Track a scope for reference walks while it stays alive
    pub fn track_scope(&self, scope: &NamespaceRef) {
        self.scopes.lock().push(Arc::downgrade(scope));
    }

    /// Loaded modules, sorted by name
    #[must_use]
    pub fn modules(&self) -> Vec<NamespaceRef> {
        let mut modules: Vec<NamespaceRef> = self
            .modules
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        modules.sort_by(|a, b| a.name().cmp(b.name()));
        modules
    }

    /// Number of loaded modules
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of tracked scopes, live or not yet collected
    #[must_use]
    pub fn tracked_scope_count(&self) -> usize {
        self.scopes.lock().len()
    }

    fn roots(&self) -> Vec<NamespaceRef> {
        let mut roots = self.modules();
        roots.extend(self.scopes.lock().iter().filter_map(Weak::upgrade));
        roots
    }
}

impl HeapIntrospection for Runtime {
    fn collect(&self) -> usize {
        let mut scopes = self.scopes.lock();
        let before = scopes.len();
        scopes.retain(|scope| scope.strong_count() > 0);
        let reclaimed = before - scopes.len();
        tracing::trace!(reclaimed, live = scopes.len(), "scope collection");
        reclaimed
    }

    fn referrers(&self, target: &Value) -> Vec<Referrer> {
        let mut walk = ReferenceWalk::new(target);
        walk.run(self.roots().into_iter().map(Value::Namespace).collect());
        tracing::trace!(found = walk.found.len(), "reference walk");
        walk.found
    }

    fn module(&self, name: &str) -> Option<NamespaceRef> {
        self.import(name).ok()
    }
}

/// Depth-first walk over containers, visiting each one once
///
/// Uses an explicit work stack, so nesting depth is bounded by memory rather
/// than by the thread's stack.
struct ReferenceWalk<'t> {
    target: &'t Value,
    visited: HashSet<usize>,
    found: Vec<Referrer>,
}

impl<'t> ReferenceWalk<'t> {
    fn new(target: &'t Value) -> Self {
        Self {
            target,
            visited: HashSet::new(),
            found: Vec::new(),
        }
    }

    fn run(&mut self, mut pending: Vec<Value>) {
        // Popped from the back; reversed so roots go in order.
        pending.reverse();
        while let Some(value) = pending.pop() {
            let Some(addr) = value.addr() else {
                continue;
            };
            let Some((referrer, children)) = Self::expand(&value) else {
                continue;
            };
            if !self.visited.insert(addr) {
                continue;
            }

            if children.iter().any(|child| child.is_identical(self.target)) {
                self.found.push(referrer);
            }
            pending.extend(children.into_iter().rev());
        }
    }

    fn expand(value: &Value) -> Option<(Referrer, Vec<Value>)> {
        let expanded = match value {
            Value::Namespace(ns) => (
                Referrer::Namespace(Arc::clone(ns)),
                ns.entries().into_iter().map(|(_, v)| v).collect(),
            ),
            Value::List(list) => (Referrer::List(list.clone()), list.to_vec()),
            Value::Dict(dict) => (
                Referrer::Dict(dict.clone()),
                dict.entries().into_iter().map(|(_, v)| v).collect(),
            ),
            Value::Class(class) => (
                Referrer::Class(Arc::clone(class)),
                class
                    .list_attributes()
                    .into_iter()
                    .chain(class.list_methods())
                    .filter_map(|name| class.get_member(&name))
                    .collect(),
            ),
            _ => return None,
        };
        Some(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Callable;
    use crate::class::ClassObject;

    fn noop(name: &str) -> Value {
        Value::Callable(Callable::builder(name).body(|_| Ok(Value::None)))
    }

    #[test]
    fn define_and_import() {
        let rt = Runtime::new();
        let module = rt.define_module("pkg").unwrap();
        assert!(Arc::ptr_eq(&module, &rt.import("pkg").unwrap()));
        assert_eq!(
            rt.define_module("pkg").unwrap_err(),
            RuntimeError::ModuleAlreadyLoaded("pkg".into())
        );
        assert_eq!(
            rt.import("missing").unwrap_err(),
            RuntimeError::ModuleNotFound("missing".into())
        );
    }

    #[test]
    fn referrers_finds_modules_and_containers() {
        let rt = Runtime::new();
        let f = noop("f");
        let a = rt.define_module("a").unwrap();
        let b = rt.define_module("b").unwrap();
        a.set("f", f.clone());
        b.set("registry", Value::list([f.clone()]));

        let found = rt.referrers(&f);
        let kinds: Vec<&str> = found.iter().map(Referrer::kind).collect();
        assert_eq!(kinds, vec!["module", "list"]);
        assert!(Arc::ptr_eq(found[0].as_module().unwrap(), &a));
    }

    #[test]
    fn referrers_looks_into_class_members() {
        let rt = Runtime::new();
        let method = noop("now");
        let class = ClassObject::builder("Clock")
            .member("now", method.clone())
            .build();
        rt.define_module("clock").unwrap().set("Clock", Value::Class(class));

        let found = rt.referrers(&method);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), "class");
    }

    #[test]
    fn cyclic_containers_terminate() {
        let rt = Runtime::new();
        let list = List::new(Vec::new());
        list.push(Value::List(list.clone()));
        rt.define_module("cyc").unwrap().set("loop", Value::List(list));

        assert!(rt.referrers(&noop("absent")).is_empty());
    }

    #[test]
    fn deeply_nested_containers_are_walked_without_recursion() {
        let rt = Runtime::new();
        let f = noop("f");
        let mut nested = Value::list([f.clone()]);
        for _ in 0..200_000 {
            nested = Value::list([nested]);
        }
        rt.define_module("data").unwrap().set("nested", nested);
        rt.define_module("pkg").unwrap().set("f", f.clone());

        let kinds: Vec<&str> = rt.referrers(&f).iter().map(Referrer::kind).collect();
        assert_eq!(kinds, vec!["list", "module"]);
    }

    #[test]
    fn collect_reclaims_dead_scopes() {
        let rt = Runtime::new();
        let f = noop("f");
        let kept = Namespace::scope("kept");
        kept.set("f", f.clone());
        rt.track_scope(&kept);
        {
            let dropped = Namespace::scope("dropped");
            dropped.set("f", f.clone());
            rt.track_scope(&dropped);
        }

        assert_eq!(rt.tracked_scope_count(), 2);
        assert_eq!(rt.collect(), 1);
        assert_eq!(rt.tracked_scope_count(), 1);
        assert_eq!(rt.referrers(&f).len(), 1);
    }

    #[test]
    fn unloaded_modules_are_not_walked() {
        let rt = Runtime::new();
        let f = noop("f");
        rt.define_module("gone").unwrap().set("f", f.clone());
        rt.unload("gone");
        assert!(rt.referrers(&f).is_empty());
    }
}
