//! Garbage collection of superseded versions
//!
//! A pass computes nothing itself: the caller samples the horizon (the
//! minimum snapshot among active transactions) once and hands it in.
//! Any version whose end timestamp is at or below the horizon is
//! unreachable by every current transaction and, because the clock is
//! monotonic, by every future one, so it can be unlinked. The chain
//! head is never collected.
//!
//! Failures are non-fatal by construction: a version missed by one pass
//! is simply reclaimed by the next.

use crate::store::VersionStore;
use tidemark_core::Timestamp;

/// Outcome of one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStats {
    /// Chains examined during the pass.
    pub chains_scanned: usize,
    /// Version slots freed during the pass.
    pub versions_pruned: usize,
}

/// Run one collection pass over every chain in `store`.
///
/// The sampled `horizon` is treated as a fixed lower bound for the
/// whole pass: transactions beginning mid-pass receive snapshots at or
/// above it and are unaffected. Touches one chain's structure at a
/// time; readers of other chains are never blocked.
pub fn sweep(store: &VersionStore, horizon: Timestamp) -> GcStats {
    let (chains_scanned, versions_pruned) = store.prune(horizon);
    if versions_pruned > 0 {
        tracing::debug!(
            horizon = horizon.as_u64(),
            chains_scanned,
            versions_pruned,
            "gc pass reclaimed versions"
        );
    }
    GcStats {
        chains_scanned,
        versions_pruned,
    }
}
