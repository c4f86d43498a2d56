//! Scoped instrumentation sessions
//!
//! [`Bond`] is the entry point. It resolves each target, builds its proxy
//! through the [`InstrumentationPolicy`] and installs it with the
//! [`ReferencePatcher`]. The returned [`Session`] owns every undo log; dropping
//! it (normal exit, early return or panic unwind) restores all original
//! bindings, newest installation first.
//!
//! # Example
//!
//! ```rust
//! use bond_core::{calls, Bond, Target};
//! use bond_runtime::{Callable, Runtime, Signature, Value};
//!
//! let runtime = Runtime::new();
//! let disk = runtime.define_module("disk").unwrap();
//! let write = Callable::builder("write")
//!     .module("disk")
//!     .signature(Signature::new().positional("data"))
//!     .body(|_| Ok(Value::None));
//! disk.set("write", write.clone());
//!
//! let bond = Bond::new(&runtime);
//! {
//!     let _session = bond.spy([Target::attribute(&disk, "write")]).unwrap();
//!     let proxy = disk.get("write").unwrap();
//!     proxy.call(&bond_runtime::CallArgs::positional([Value::from("bytes")])).unwrap();
//!     assert_eq!(calls(&proxy).unwrap().len(), 1);
//! }
//! assert!(disk.get("write").unwrap().is_identical(&Value::Callable(write)));
//! ```

use crate::config::BondConfig;
use crate::error::BondError;
use crate::patcher::{BindingSite, ReferencePatcher, UndoLog};
use crate::policy::{Advisory, InstrumentationPolicy};
use crate::signature::{NativeSignatureTable, SignatureComparator};
use bond_runtime::{Callable, ClassRef, HeapIntrospection, NamespaceRef, Value};
use std::sync::Arc;
use uuid::Uuid;

/// What to instrument
#[derive(Debug, Clone)]
pub enum Target {
    /// Named slot of a namespace
    Attribute {
        /// Namespace holding the slot
        namespace: NamespaceRef,
        /// Slot name
        name: String,
    },
    /// A live object, wherever it is bound
    Reference(Value),
}

impl Target {
    /// Target a namespace slot
    #[must_use]
    pub fn attribute(namespace: &NamespaceRef, name: impl Into<String>) -> Self {
        Self::Attribute {
            namespace: Arc::clone(namespace),
            name: name.into(),
        }
    }

    /// Target a live object
    #[must_use]
    pub fn reference(value: impl Into<Value>) -> Self {
        Self::Reference(value.into())
    }

    /// Current value of the target and its canonical definition slot
    ///
    /// A reference resolves its canonical slot through its owning module and
    /// name, when that slot still holds it.
    ///
    /// # Errors
    /// Returns [`BondError::Runtime`] when a namespace slot is unbound.
    pub fn resolve(
        &self,
        heap: &dyn HeapIntrospection,
    ) -> Result<(Value, Option<BindingSite>), BondError> {
        match self {
            Self::Attribute { namespace, name } => {
                let value = namespace.try_get(name)?;
                Ok((value, Some(BindingSite::new(Arc::clone(namespace), name.clone()))))
            }
            Self::Reference(value) => Ok((value.clone(), canonical_site(heap, value))),
        }
    }
}

fn canonical_site(heap: &dyn HeapIntrospection, value: &Value) -> Option<BindingSite> {
    let (module, name) = match value {
        Value::Callable(c) => (c.module()?, c.name()),
        Value::Class(c) => (c.module()?, c.name()),
        _ => return None,
    };
    let namespace = heap.module(module)?;
    let bound = namespace.get(name)?;
    bound
        .is_identical(value)
        .then(|| BindingSite::new(namespace, name))
}

impl From<Value> for Target {
    fn from(value: Value) -> Self {
        Self::Reference(value)
    }
}

impl From<Callable> for Target {
    fn from(callable: Callable) -> Self {
        Self::Reference(Value::Callable(callable))
    }
}

impl From<ClassRef> for Target {
    fn from(class: ClassRef) -> Self {
        Self::Reference(Value::Class(class))
    }
}

impl From<(&NamespaceRef, &str)> for Target {
    fn from((namespace, name): (&NamespaceRef, &str)) -> Self {
        Self::attribute(namespace, name)
    }
}

/// A target with its replacement
#[derive(Debug, Clone)]
pub struct StubTarget {
    /// What to replace
    pub target: Target,
    /// What to put in its place (wrapped before installing)
    pub replacement: Value,
}

impl StubTarget {
    /// Create stub target
    #[must_use]
    pub fn new(target: impl Into<Target>, replacement: impl Into<Value>) -> Self {
        Self {
            target: target.into(),
            replacement: replacement.into(),
        }
    }
}

impl<T: Into<Target>, R: Into<Value>> From<(T, R)> for StubTarget {
    fn from((target, replacement): (T, R)) -> Self {
        Self::new(target, replacement)
    }
}

impl<R: Into<Value>> From<(&NamespaceRef, &str, R)> for StubTarget {
    fn from((namespace, name, replacement): (&NamespaceRef, &str, R)) -> Self {
        Self::new(Target::attribute(namespace, name), replacement)
    }
}

struct Installation {
    original: Value,
    proxy: Value,
    undo: UndoLog,
}

/// Live instrumentation scope
///
/// Holds every installed proxy and the undo logs that remove them.
pub struct Session {
    id: Uuid,
    installations: Vec<Installation>,
    advisories: Vec<Advisory>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            installations: Vec::new(),
            advisories: Vec::new(),
        }
    }

    /// Session identifier, as logged
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of installed targets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.installations.len()
    }

    /// Check if nothing is installed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }

    /// Non-fatal findings collected while installing
    #[must_use]
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Installed proxies, in installation order
    #[must_use]
    pub fn proxies(&self) -> Vec<Value> {
        self.installations.iter().map(|i| i.proxy.clone()).collect()
    }

    /// Proxy installed in place of `original`
    #[must_use]
    pub fn proxy_for(&self, original: &Value) -> Option<&Value> {
        self.installations
            .iter()
            .find(|i| i.original.is_identical(original))
            .map(|i| &i.proxy)
    }

    /// Number of bindings this session rewrote
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.installations.iter().map(|i| i.undo.len()).sum()
    }

    /// End the session now; returns how many bindings were restored
    pub fn close(mut self) -> usize {
        self.teardown()
    }

    fn teardown(&mut self) -> usize {
        if self.installations.is_empty() {
            return 0;
        }
        let restored: usize = std::mem::take(&mut self.installations)
            .into_iter()
            .rev()
            .map(|installation| installation.undo.undo())
            .sum();
        tracing::info!(session = %self.id, restored, "session closed");
        restored
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("installed", &self.installations.len())
            .field("bindings", &self.binding_count())
            .field("advisories", &self.advisories)
            .finish()
    }
}

/// Instrumentation engine bound to a heap
pub struct Bond<'h> {
    heap: &'h dyn HeapIntrospection,
    config: BondConfig,
    comparator: SignatureComparator,
}

impl<'h> Bond<'h> {
    /// Engine with default configuration
    #[must_use]
    pub fn new(heap: &'h dyn HeapIntrospection) -> Self {
        Self {
            heap,
            config: BondConfig::default(),
            comparator: SignatureComparator::new(),
        }
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: BondConfig) -> Self {
        self.config = config;
        self
    }

    /// With a custom native signature table
    #[must_use]
    pub fn with_native_signatures(mut self, table: NativeSignatureTable) -> Self {
        self.comparator = SignatureComparator::with_natives(table);
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BondConfig {
        &self.config
    }

    /// Signature comparator in use
    #[inline]
    #[must_use]
    pub fn comparator(&self) -> &SignatureComparator {
        &self.comparator
    }

    /// Replace targets with recording proxies of their replacements
    ///
    /// Checks compatibility when the configuration is strict.
    ///
    /// # Errors
    /// Any resolution, policy or compatibility error. Targets installed before
    /// the failure are restored before it is returned.
    pub fn stub<I, T>(&self, targets: I) -> Result<Session, BondError>
    where
        I: IntoIterator<Item = T>,
        T: Into<StubTarget>,
    {
        self.open(targets, self.config.strict)
    }

    /// Replace targets with recording proxies of themselves
    ///
    /// # Errors
    /// Resolution errors, or an unsupported target kind.
    pub fn spy<I, T>(&self, targets: I) -> Result<Session, BondError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        self.install_all(targets.into_iter().map(|t| (t.into(), None)), false)
    }

    /// Stub with an explicit strict flag
    ///
    /// # Errors
    /// See [`Bond::stub`].
    pub fn open<I, T>(&self, targets: I, strict: bool) -> Result<Session, BondError>
    where
        I: IntoIterator<Item = T>,
        T: Into<StubTarget>,
    {
        self.install_all(
            targets.into_iter().map(|t| {
                let StubTarget {
                    target,
                    replacement,
                } = t.into();
                (target, Some(replacement))
            }),
            strict,
        )
    }

    /// Run `body` inside a stub session
    ///
    /// # Errors
    /// See [`Bond::stub`]. Errors of `body` itself are part of `R`.
    pub fn with_stub<I, T, F, R>(&self, targets: I, body: F) -> Result<R, BondError>
    where
        I: IntoIterator<Item = T>,
        T: Into<StubTarget>,
        F: FnOnce(&Session) -> R,
    {
        let session = self.stub(targets)?;
        Ok(body(&session))
    }

    /// Run `body` inside a spy session
    ///
    /// # Errors
    /// See [`Bond::spy`].
    pub fn with_spy<I, T, F, R>(&self, targets: I, body: F) -> Result<R, BondError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
        F: FnOnce(&Session) -> R,
    {
        let session = self.spy(targets)?;
        Ok(body(&session))
    }

    fn install_all(
        &self,
        targets: impl Iterator<Item = (Target, Option<Value>)>,
        strict: bool,
    ) -> Result<Session, BondError> {
        let policy = InstrumentationPolicy::new(&self.comparator, self.config.snapshot);
        let patcher = ReferencePatcher::new(self.heap, self.config);
        // Dropped on early return, which undoes everything installed so far.
        let mut session = Session::new();

        for (target, replacement) in targets {
            let (original, canonical) = target.resolve(self.heap)?;
            let replacement = replacement.unwrap_or_else(|| original.clone());
            let built = policy.build(&original, &replacement, strict).map_err(|err| {
                tracing::debug!(session = %session.id, %err, "install rejected");
                err
            })?;
            let undo = patcher.install(canonical.as_ref(), &original, &built.value);
            tracing::debug!(
                session = %session.id,
                original = ?original,
                bindings = undo.len(),
                "target instrumented"
            );
            session.advisories.extend(built.advisories);
            session.installations.push(Installation {
                original,
                proxy: built.value,
                undo,
            });
        }

        tracing::info!(
            session = %session.id,
            targets = session.len(),
            bindings = session.binding_count(),
            strict,
            "session opened"
        );
        Ok(session)
    }
}

impl std::fmt::Debug for Bond<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bond")
            .field("config", &self.config)
            .field("comparator", &self.comparator)
            .finish_non_exhaustive()
    }
}

/// [`Bond::stub`] with the default configuration
///
/// # Errors
/// See [`Bond::stub`].
pub fn stub<I, T>(heap: &dyn HeapIntrospection, targets: I) -> Result<Session, BondError>
where
    I: IntoIterator<Item = T>,
    T: Into<StubTarget>,
{
    Bond::new(heap).stub(targets)
}

/// [`Bond::spy`] with the default configuration
///
/// # Errors
/// See [`Bond::spy`].
pub fn spy<I, T>(heap: &dyn HeapIntrospection, targets: I) -> Result<Session, BondError>
where
    I: IntoIterator<Item = T>,
    T: Into<Target>,
{
    Bond::new(heap).spy(targets)
}

/// [`Bond::with_stub`] with the default configuration
///
/// # Errors
/// See [`Bond::stub`].
pub fn with_stub<I, T, F, R>(heap: &dyn HeapIntrospection, targets: I, body: F) -> Result<R, BondError>
where
    I: IntoIterator<Item = T>,
    T: Into<StubTarget>,
    F: FnOnce(&Session) -> R,
{
    Bond::new(heap).with_stub(targets, body)
}

/// [`Bond::with_spy`] with the default configuration
///
/// # Errors
/// See [`Bond::spy`].
pub fn with_spy<I, T, F, R>(heap: &dyn HeapIntrospection, targets: I, body: F) -> Result<R, BondError>
where
    I: IntoIterator<Item = T>,
    T: Into<Target>,
    F: FnOnce(&Session) -> R,
{
    Bond::new(heap).with_spy(targets, body)
}
