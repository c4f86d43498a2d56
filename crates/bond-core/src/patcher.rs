//! Reference graph patching
//!
//! The [`ReferencePatcher`] moves a replacement into every module slot that
//! holds the original, and records how to move the original back.
//!
//! # Overview
//!
//! 1. The canonical definition slot is rewritten first.
//! 2. A reachability pass runs, so scopes nobody holds any more are not
//!    mistaken for live bindings.
//! 3. The heap is asked for every container holding the original. Only module
//!    namespaces are rewritten; lists, dicts, class members and plain scopes
//!    are data and stay untouched.
//!
//! Each rewrite becomes an [`UndoAction`]. [`UndoLog::undo`] replays them in
//! reverse order.

use crate::config::BondConfig;
use bond_runtime::{HeapIntrospection, NamespaceRef, Value};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// A module slot currently bound to some value
#[derive(Debug, Clone)]
pub struct BindingSite {
    /// Namespace holding the slot
    pub namespace: NamespaceRef,
    /// Slot name
    pub slot: String,
}

impl BindingSite {
    /// Create binding site
    #[must_use]
    pub fn new(namespace: NamespaceRef, slot: impl Into<String>) -> Self {
        Self {
            namespace,
            slot: slot.into(),
        }
    }

    /// Same namespace object and slot name
    #[must_use]
    pub fn same_site(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.namespace, &other.namespace) && self.slot == other.slot
    }
}

/// One recorded rewrite
pub struct UndoAction {
    site: BindingSite,
    previous: Option<Value>,
}

impl UndoAction {
    /// Slot that was rewritten
    #[inline]
    #[must_use]
    pub fn site(&self) -> &BindingSite {
        &self.site
    }

    /// Value the slot held before the rewrite
    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    /// Put the previous value back (or unbind the slot if it had none)
    pub fn apply(self) {
        let BindingSite { namespace, slot } = self.site;
        tracing::debug!(namespace = namespace.name(), slot = %slot, "restoring binding");
        match self.previous {
            Some(value) => {
                namespace.set(slot, value);
            }
            None => {
                namespace.remove(&slot);
            }
        }
    }
}

impl Debug for UndoAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "UndoAction({}.{})", self.site.namespace.name(), self.site.slot)
    }
}

/// Append-only list of rewrites, undone newest first
#[derive(Debug, Default)]
pub struct UndoLog {
    actions: Vec<UndoAction>,
}

impl UndoLog {
    /// Create empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rewrite
    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    /// Append every action of another log after ours
    pub fn extend(&mut self, other: UndoLog) {
        self.actions.extend(other.actions);
    }

    /// Recorded rewrites, oldest first
    #[must_use]
    pub fn actions(&self) -> &[UndoAction] {
        &self.actions
    }

    /// Number of rewrites
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if nothing was rewritten
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Replay every action in reverse order; returns how many ran
    pub fn undo(self) -> usize {
        let count = self.actions.len();
        for action in self.actions.into_iter().rev() {
            action.apply();
        }
        count
    }
}

/// Installs replacements across the live namespace graph
pub struct ReferencePatcher<'h> {
    heap: &'h dyn HeapIntrospection,
    config: BondConfig,
}

impl<'h> ReferencePatcher<'h> {
    /// Create patcher over a heap
    #[must_use]
    pub fn new(heap: &'h dyn HeapIntrospection, config: BondConfig) -> Self {
        Self { heap, config }
    }

    /// Replace `original` with `replacement` at its canonical slot and at
    /// every other module slot bound to it
    pub fn install(
        &self,
        canonical: Option<&BindingSite>,
        original: &Value,
        replacement: &Value,
    ) -> UndoLog {
        let mut log = UndoLog::new();

        if let Some(site) = canonical {
            log.push(rewrite(site.clone(), replacement));
        }

        if self.config.rewrite_bound_references {
            if self.config.collect_before_scan {
                let reclaimed = self.heap.collect();
                tracing::trace!(reclaimed, "collected before scan");
            }
            for site in self.binding_sites(original) {
                log.push(rewrite(site, replacement));
            }
        }

        tracing::debug!(rewrites = log.len(), "replacement installed");
        log
    }

    /// Module slots currently bound to `target`, by identity
    #[must_use]
    pub fn binding_sites(&self, target: &Value) -> Vec<BindingSite> {
        self.heap
            .referrers(target)
            .iter()
            .filter_map(|referrer| referrer.as_module())
            .flat_map(|namespace| {
                namespace
                    .bindings_of(target)
                    .into_iter()
                    .map(|slot| BindingSite::new(Arc::clone(namespace), slot))
            })
            .collect()
    }
}

impl Debug for ReferencePatcher<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferencePatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn rewrite(site: BindingSite, replacement: &Value) -> UndoAction {
    tracing::debug!(namespace = site.namespace.name(), slot = %site.slot, "rewriting binding");
    let previous = site.namespace.set(site.slot.clone(), replacement.clone());
    UndoAction { site, previous }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bond_runtime::{Callable, ModuleMetadata, Namespace, Referrer};
    use mockall::mock;

    mock! {
        Heap {}

        impl HeapIntrospection for Heap {
            fn collect(&self) -> usize;
            fn referrers(&self, target: &Value) -> Vec<Referrer>;
            fn module(&self, name: &str) -> Option<NamespaceRef>;
        }
    }

    fn noop(name: &str) -> Value {
        Value::Callable(Callable::builder(name).body(|_| Ok(Value::None)))
    }

    fn module(name: &str) -> NamespaceRef {
        Namespace::module(name, ModuleMetadata::new("test"))
    }

    #[test]
    fn rewrites_only_module_slots() {
        let original = noop("f");
        let replacement = noop("g");
        let owner = module("owner");
        let consumer = module("consumer");
        let scope = Namespace::scope("locals");
        let registry = bond_runtime::List::new(vec![original.clone()]);
        owner.set("f", original.clone());
        consumer.set("f", original.clone());
        consumer.set("alias", original.clone());
        scope.set("f", original.clone());

        let referrers = vec![
            Referrer::Namespace(Arc::clone(&consumer)),
            Referrer::Namespace(Arc::clone(&scope)),
            Referrer::List(registry.clone()),
        ];
        let mut heap = MockHeap::new();
        heap.expect_collect().times(1).return_const(0_usize);
        heap.expect_referrers().times(1).return_const(referrers);

        let patcher = ReferencePatcher::new(&heap, BondConfig::default());
        let log = patcher.install(
            Some(&BindingSite::new(Arc::clone(&owner), "f")),
            &original,
            &replacement,
        );

        assert_eq!(log.len(), 3);
        assert!(owner.get("f").unwrap().is_identical(&replacement));
        assert!(consumer.get("f").unwrap().is_identical(&replacement));
        assert!(consumer.get("alias").unwrap().is_identical(&replacement));
        assert!(scope.get("f").unwrap().is_identical(&original));
        assert!(registry.get(0).unwrap().is_identical(&original));

        assert_eq!(log.undo(), 3);
        for (ns, slot) in [(&owner, "f"), (&consumer, "f"), (&consumer, "alias")] {
            assert!(ns.get(slot).unwrap().is_identical(&original));
        }
    }

    #[test]
    fn scan_can_be_disabled() {
        let original = noop("f");
        let owner = module("owner");
        owner.set("f", original.clone());

        let mut heap = MockHeap::new();
        heap.expect_collect().never();
        heap.expect_referrers().never();

        let config = BondConfig::new().with_rewrite_bound_references(false);
        let patcher = ReferencePatcher::new(&heap, config);
        let log = patcher.install(
            Some(&BindingSite::new(Arc::clone(&owner), "f")),
            &original,
            &noop("g"),
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn collection_is_optional() {
        let mut heap = MockHeap::new();
        heap.expect_collect().never();
        heap.expect_referrers().times(1).returning(|_| Vec::new());

        let config = BondConfig::new().with_collect_before_scan(false);
        let log = ReferencePatcher::new(&heap, config).install(None, &noop("f"), &noop("g"));
        assert!(log.is_empty());
    }

    #[test]
    fn undo_runs_newest_first() {
        let ns = module("m");
        ns.set("x", 1);

        let mut log = UndoLog::new();
        log.push(rewrite(BindingSite::new(Arc::clone(&ns), "x"), &Value::from(2)));
        log.push(rewrite(BindingSite::new(Arc::clone(&ns), "x"), &Value::from(3)));
        assert_eq!(ns.get("x"), Some(Value::from(3)));

        log.undo();
        assert_eq!(ns.get("x"), Some(Value::from(1)));
    }

    #[test]
    fn undo_unbinds_fresh_slots() {
        let ns = module("m");
        let log = {
            let mut log = UndoLog::new();
            log.push(rewrite(BindingSite::new(Arc::clone(&ns), "new"), &Value::from(1)));
            log
        };
        assert!(log.actions()[0].previous().is_none());
        log.undo();
        assert!(!ns.contains("new"));
    }

    #[test]
    fn binding_sites_against_real_runtime() {
        let rt = bond_runtime::Runtime::new();
        let f = noop("f");
        rt.define_module("a").unwrap().set("f", f.clone());
        rt.define_module("b").unwrap().set("imported_f", f.clone());

        let patcher = ReferencePatcher::new(&rt, BondConfig::default());
        let sites = patcher.binding_sites(&f);
        let names: Vec<_> = sites
            .iter()
            .map(|s| format!("{}.{}", s.namespace.name(), s.slot))
            .collect();
        assert_eq!(names, vec!["a.f", "b.imported_f"]);
        assert!(sites[0].same_site(&sites[0].clone()));
        assert!(!sites[0].same_site(&sites[1]));
    }
}
