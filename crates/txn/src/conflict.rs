//! Commit-time conflict detection
//!
//! First-committer-wins at snapshot-isolation strength: a buffered write
//! loses iff some other transaction installed a newer head for the same
//! key after this transaction's snapshot. Validation is key-level; write
//! skew across disjoint keys is not detected.

use crate::transaction::Transaction;
use tidemark_core::{Key, Timestamp};
use tidemark_mvcc::VersionStore;

/// A buffered write that lost the first-committer-wins race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleWrite {
    /// The contested key.
    pub key: Key,
    /// The losing transaction's snapshot.
    pub snapshot: Timestamp,
    /// Begin timestamp of the newer head installed by the winner.
    pub head_begin: Timestamp,
}

/// Accumulated validation outcome. The transaction commits only when no
/// conflict was found.
#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    /// Every stale write detected.
    pub conflicts: Vec<StaleWrite>,
}

impl ConflictReport {
    /// Whether validation passed.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The first conflict found, if any.
    pub fn first(&self) -> Option<&StaleWrite> {
        self.conflicts.first()
    }
}

/// Check every buffered write against the current chain head. A head
/// begin timestamp above the transaction's snapshot means a concurrent
/// transaction committed that key first.
pub fn validate(txn: &Transaction, store: &VersionStore) -> ConflictReport {
    let mut report = ConflictReport::default();
    for (key, _) in txn.writes() {
        if let Some(head_begin) = store.head_begin(key) {
            if head_begin > txn.snapshot() {
                report.conflicts.push(StaleWrite {
                    key: key.clone(),
                    snapshot: txn.snapshot(),
                    head_begin,
                });
            }
        }
    }
    report
}
