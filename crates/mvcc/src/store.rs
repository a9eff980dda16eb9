//! Concurrent version store
//!
//! One map entry per key owns that key's version chain. Reads take
//! shared guards, so readers of the same chain never block each other;
//! `append` takes the entry's exclusive guard, which is the sole
//! serialization point for that key. No operation locks the whole
//! store.

use crate::version::VersionChain;
use dashmap::DashMap;
use tidemark_core::{Key, Timestamp, Value};

/// Visibility-aware multi-version store.
///
/// Thread-safe; share behind an `Arc`. Exclusive access is scoped to a
/// single key's chain for the duration of a structural edit, never
/// across a blocking wait.
#[derive(Debug, Default)]
pub struct VersionStore {
    chains: DashMap<Key, VersionChain>,
}

impl VersionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the version of `key` visible at `snapshot`.
    ///
    /// Returns the value together with the begin timestamp of the
    /// version observed (recorded into read-sets), or `None` when no
    /// version is visible, which is a normal negative result, not an error.
    pub fn read(&self, key: &Key, snapshot: Timestamp) -> Option<(Value, Timestamp)> {
        let chain = self.chains.get(key)?;
        chain
            .visible(snapshot)
            .map(|version| (version.data().clone(), version.begin()))
    }

    /// Begin timestamp of the current chain head for `key`, if the key
    /// has ever been written. First-committer-wins conflict detection
    /// compares this against a committing transaction's snapshot.
    pub fn head_begin(&self, key: &Key) -> Option<Timestamp> {
        self.chains.get(key).and_then(|chain| chain.head_begin())
    }

    /// Atomically install a new head version of `key` committed at
    /// `commit_ts`. The previous head (if any) is sealed at the same
    /// timestamp; concurrent readers observe either the old head or the
    /// fully linked new one, never an intermediate state.
    pub fn append(&self, key: Key, data: Value, commit_ts: Timestamp) {
        self.chains.entry(key).or_default().install(data, commit_ts);
    }

    /// Number of keys with at least one version.
    pub fn key_count(&self) -> usize {
        self.chains.len()
    }

    /// Number of live versions currently stored for `key`.
    pub fn version_count(&self, key: &Key) -> usize {
        self.chains.get(key).map_or(0, |chain| chain.len())
    }

    /// One collection pass: prune every chain against `horizon`,
    /// holding exclusive access to at most one chain at a time.
    /// Returns (chains scanned, versions freed).
    pub(crate) fn prune(&self, horizon: Timestamp) -> (usize, usize) {
        let mut scanned = 0;
        let mut freed = 0;
        for mut entry in self.chains.iter_mut() {
            scanned += 1;
            freed += entry.value_mut().prune(horizon);
        }
        (scanned, freed)
    }
}
