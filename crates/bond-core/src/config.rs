//! Engine configuration

use serde::{Deserialize, Serialize};

/// How call arguments are captured before the wrapped callable runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
    /// Deep copy each argument; keep a reference to any that cannot be copied
    #[default]
    DeepWithFallback,
    /// Keep references only (later mutation shows through)
    Reference,
}

/// Instrumentation settings
///
/// # Example
/// ```
/// use bond_core::{BondConfig, SnapshotPolicy};
///
/// let config = BondConfig::new()
///     .with_strict(false)
///     .with_snapshot(SnapshotPolicy::Reference);
/// assert!(!config.strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BondConfig {
    /// Require signature and member parity for stubs
    pub strict: bool,
    /// Argument capture policy
    pub snapshot: SnapshotPolicy,
    /// Run a reachability pass before scanning for bound references
    pub collect_before_scan: bool,
    /// Rewrite bound references beyond the canonical definition slot
    pub rewrite_bound_references: bool,
}

impl BondConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With strict mode
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// With snapshot policy
    #[inline]
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: SnapshotPolicy) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// With collection before scanning
    #[inline]
    #[must_use]
    pub fn with_collect_before_scan(mut self, collect: bool) -> Self {
        self.collect_before_scan = collect;
        self
    }

    /// With bound-reference rewriting
    #[inline]
    #[must_use]
    pub fn with_rewrite_bound_references(mut self, rewrite: bool) -> Self {
        self.rewrite_bound_references = rewrite;
        self
    }
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            strict: true,
            snapshot: SnapshotPolicy::DeepWithFallback,
            collect_before_scan: true,
            rewrite_bound_references: true,
        }
    }
}
