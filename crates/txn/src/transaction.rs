//! Transaction context
//!
//! A `Transaction` is the caller-owned handle for one unit of work. It
//! carries the snapshot fixed at begin, the buffered write-set (nothing
//! touches the store before commit), the read-set of observed version
//! timestamps, and the lifecycle state.

use rustc_hash::FxHashMap;
use std::fmt;
use tidemark_core::{Error, Key, Result, Timestamp, TxnId, Value};

/// Lifecycle state of a transaction.
///
/// Transitions: `Active` → `Committed` and `Active` → `Aborted`; both
/// targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Executing; may read, write, lock, commit, or abort.
    Active,
    /// Commit finished; writes are visible at the commit timestamp.
    Committed,
    /// Rolled back; buffered writes were discarded.
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// A single snapshot-isolated unit of work.
///
/// Created by [`TransactionManager::begin`](crate::TransactionManager::begin)
/// and driven through the manager; the handle itself only carries state.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    snapshot: Timestamp,
    state: TransactionState,
    write_set: FxHashMap<Key, Value>,
    read_set: FxHashMap<Key, Timestamp>,
}

impl Transaction {
    pub(crate) fn new(id: TxnId, snapshot: Timestamp) -> Self {
        Self {
            id,
            snapshot,
            state: TransactionState::Active,
            write_set: FxHashMap::default(),
            read_set: FxHashMap::default(),
        }
    }

    /// This transaction's identifier.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// The snapshot timestamp fixed at begin. Every read observes the
    /// store as of this point.
    pub fn snapshot(&self) -> Timestamp {
        self.snapshot
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether the transaction can still be driven.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// The begin timestamp this transaction observed for `key`, if it
    /// read the key from the store.
    pub fn observed_read(&self, key: &Key) -> Option<Timestamp> {
        self.read_set.get(key).copied()
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                txn: self.id,
                state: self.state.to_string(),
            })
        }
    }

    /// Buffer a write; applied only at commit.
    pub(crate) fn stage_write(&mut self, key: Key, value: Value) {
        self.write_set.insert(key, value);
    }

    /// Pending buffered value for `key` (read-your-writes).
    pub(crate) fn pending(&self, key: &Key) -> Option<&Value> {
        self.write_set.get(key)
    }

    /// Record the begin timestamp of a version observed from the store.
    pub(crate) fn record_read(&mut self, key: Key, begin: Timestamp) {
        self.read_set.insert(key, begin);
    }

    pub(crate) fn writes(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.write_set.iter()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
        self.discard_sets();
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
        self.discard_sets();
    }

    /// Terminal states keep no buffered state around.
    fn discard_sets(&mut self) {
        self.write_set = FxHashMap::default();
        self.read_set = FxHashMap::default();
    }
}
