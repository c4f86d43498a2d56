//! Signature comparison
//!
//! Provides [`SignatureComparator`], which decides whether a replacement
//! callable can stand in for an original by comparing normalized
//! [`SignatureDescriptor`]s.
//!
//! Descriptors come from pluggable [`DescriptorSource`]s, tried in order:
//! declared signatures of defined callables first, then the
//! [`NativeSignatureTable`] of well-known native callables.

use crate::error::BondError;
use crate::recorder;
use bond_runtime::{Callable, Signature};
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Formatter};

/// Normalized calling convention
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDescriptor {
    /// Number of positional parameters
    pub positional: usize,
    /// How many of those have defaults
    pub positional_defaults: usize,
    /// Accepts extra positional arguments
    pub var_positional: bool,
    /// Keyword-only parameter names
    pub keyword_only: BTreeSet<String>,
    /// Keyword-only parameter names with defaults
    pub keyword_defaults: BTreeSet<String>,
    /// Accepts extra keyword arguments
    pub var_keyword: bool,
}

impl SignatureDescriptor {
    /// Descriptor of a callable taking no arguments at all
    #[inline]
    #[must_use]
    pub fn zero_arguments() -> Self {
        Self::default()
    }

    /// Summarize a declared signature
    #[must_use]
    pub fn from_signature(signature: &Signature) -> Self {
        let positional: Vec<_> = signature.positional_params().collect();
        let keyword_only: Vec<_> = signature.keyword_only_params().collect();
        Self {
            positional: positional.len(),
            positional_defaults: positional.iter().filter(|p| p.has_default).count(),
            var_positional: signature.var_positional_param().is_some(),
            keyword_only: keyword_only.iter().map(|p| p.name.clone()).collect(),
            keyword_defaults: keyword_only
                .iter()
                .filter(|p| p.has_default)
                .map(|p| p.name.clone())
                .collect(),
            var_keyword: signature.var_keyword_param().is_some(),
        }
    }

    /// All four compatibility rules hold
    #[must_use]
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.positional_matches(other)
            && self.var_positional_matches(other)
            && self.keyword_only_matches(other)
            && self.var_keyword_matches(other)
    }

    // Zero positional parameters only matches zero.
    fn positional_matches(&self, other: &Self) -> bool {
        self.positional == other.positional
    }

    fn var_positional_matches(&self, other: &Self) -> bool {
        self.var_positional == other.var_positional
    }

    // Keyword-only names and defaulted names must agree as sets; "none" on
    // either side means none on both.
    fn keyword_only_matches(&self, other: &Self) -> bool {
        if self.keyword_only.is_empty() || other.keyword_only.is_empty() {
            return self.keyword_only.is_empty() && other.keyword_only.is_empty();
        }
        self.keyword_only == other.keyword_only && self.keyword_defaults == other.keyword_defaults
    }

    fn var_keyword_matches(&self, other: &Self) -> bool {
        self.var_keyword == other.var_keyword
    }
}

/// Strategy producing descriptors for some class of callables
pub trait DescriptorSource: Send + Sync {
    /// Short name for diagnostics
    fn label(&self) -> &str;

    /// Descriptor for `callable`, if this source knows it
    fn describe(&self, callable: &Callable) -> Option<SignatureDescriptor>;
}

/// Reads the declared signature of defined callables
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredSignatures;

impl DescriptorSource for DeclaredSignatures {
    fn label(&self) -> &str {
        "declared"
    }

    fn describe(&self, callable: &Callable) -> Option<SignatureDescriptor> {
        callable.signature().map(SignatureDescriptor::from_signature)
    }
}

type NativePredicate = Box<dyn Fn(&Callable) -> bool + Send + Sync>;

struct NativeEntry {
    label: String,
    matches: NativePredicate,
    descriptor: SignatureDescriptor,
}

/// Synthetic descriptors for native callables that carry no metadata
///
/// Each entry pairs an identity predicate with the descriptor to substitute.
/// Only native callables are looked up here.
#[derive(Default)]
pub struct NativeSignatureTable {
    entries: Vec<NativeEntry>,
}

impl NativeSignatureTable {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the well-known zero-argument natives
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with_qualified("time", "time", SignatureDescriptor::zero_arguments())
    }

    /// Add an entry matching `module.name`
    #[must_use]
    pub fn with_qualified(
        mut self,
        module: &str,
        name: &str,
        descriptor: SignatureDescriptor,
    ) -> Self {
        self.register_qualified(module, name, descriptor);
        self
    }

    /// Register an entry matching `module.name`
    pub fn register_qualified(&mut self, module: &str, name: &str, descriptor: SignatureDescriptor) {
        let (m, n) = (module.to_string(), name.to_string());
        self.register(
            format!("{module}.{name}"),
            move |c: &Callable| c.module() == Some(m.as_str()) && c.name() == n,
            descriptor,
        );
    }

    /// Register an entry with an arbitrary predicate
    pub fn register<F>(&mut self, label: impl Into<String>, matches: F, descriptor: SignatureDescriptor)
    where
        F: Fn(&Callable) -> bool + Send + Sync + 'static,
    {
        self.entries.push(NativeEntry {
            label: label.into(),
            matches: Box::new(matches),
            descriptor,
        });
    }

    /// Labels of registered entries
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DescriptorSource for NativeSignatureTable {
    fn label(&self) -> &str {
        "native"
    }

    fn describe(&self, callable: &Callable) -> Option<SignatureDescriptor> {
        if !callable.is_native() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| (entry.matches)(callable))
            .map(|entry| entry.descriptor.clone())
    }
}

impl Debug for NativeSignatureTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSignatureTable")
            .field("entries", &self.labels())
            .finish()
    }
}

/// Decides whether a replacement may stand in for an original
pub struct SignatureComparator {
    sources: Vec<Box<dyn DescriptorSource>>,
}

impl SignatureComparator {
    /// Declared signatures plus the default native table
    #[must_use]
    pub fn new() -> Self {
        Self::with_natives(NativeSignatureTable::with_defaults())
    }

    /// Declared signatures plus a custom native table
    #[must_use]
    pub fn with_natives(natives: NativeSignatureTable) -> Self {
        Self {
            sources: vec![Box::new(DeclaredSignatures), Box::new(natives)],
        }
    }

    /// Append another descriptor source
    #[must_use]
    pub fn with_source(mut self, source: impl DescriptorSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Descriptor for a callable
    ///
    /// # Errors
    /// Returns [`BondError::Uninspectable`] when no source can describe it.
    pub fn describe(&self, callable: &Callable) -> Result<SignatureDescriptor, BondError> {
        self.sources
            .iter()
            .find_map(|source| source.describe(callable))
            .ok_or_else(|| BondError::Uninspectable {
                name: callable.qualified_name(),
            })
    }

    /// Check compatibility of a replacement with an original
    ///
    /// A decorated original is compared through its `wrapped` link, so the
    /// decorator's own pass-through signature does not hide the real one. An
    /// original that is already a recording proxy from an enclosing session
    /// is compared through the callable that proxy replaced.
    ///
    /// # Errors
    /// Returns [`BondError::Uninspectable`] when either side cannot be described.
    pub fn compatible(&self, original: &Callable, replacement: &Callable) -> Result<bool, BondError> {
        let replaced = recorder::replaced_by(original);
        let original = replaced.as_ref().unwrap_or(original);
        let original = original.wrapped().unwrap_or(original);
        let ours = self.describe(original)?;
        let theirs = self.describe(replacement)?;
        let compatible = ours.compatible_with(&theirs);
        tracing::trace!(
            original = %original.qualified_name(),
            replacement = %replacement.qualified_name(),
            compatible,
            "signature comparison"
        );
        Ok(compatible)
    }
}

impl Default for SignatureComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SignatureComparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.sources.iter().map(|s| s.label()).collect();
        f.debug_struct("SignatureComparator")
            .field("sources", &labels)
            .finish()
    }
}
