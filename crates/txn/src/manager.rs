//! Transaction manager
//!
//! Top-level orchestrator: allocates snapshot and commit timestamps,
//! buffers writes, runs first-committer-wins validation, drives the
//! version store, and delegates locking. Any lock-level failure
//! (deadlock victim, timeout, protocol violation) deterministically
//! aborts the transaction before the error reaches the caller.
//!
//! ## Timestamp discipline
//!
//! One commit gate serializes the validate → allocate → install window
//! against snapshot allocation in `begin`. A snapshot therefore never
//! observes a timestamp whose versions are still being installed, which
//! keeps issuance order equal to visibility order.

use crate::conflict;
use crate::transaction::{Transaction, TransactionState};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tidemark_core::{Error, Key, LogicalClock, ResourceId, Result, Timestamp, TxnId, Value};
use tidemark_lock::{LockManager, LockMode};
use tidemark_mvcc::VersionStore;

/// Counters describing transaction manager activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnStats {
    /// Transactions currently active.
    pub active: usize,
    /// Transactions committed since creation.
    pub committed: u64,
    /// Transactions aborted since creation (voluntarily or forced).
    pub aborted: u64,
}

/// Orchestrates snapshot-isolated transactions over a version store and
/// a lock manager.
///
/// Thread-safe; share behind an `Arc`. Each transaction handle is owned
/// by one caller and driven through `&mut`: a single transaction is a
/// single unit of work, while many transactions proceed concurrently.
pub struct TransactionManager {
    clock: LogicalClock,
    store: Arc<VersionStore>,
    locks: Arc<LockManager>,
    /// Snapshot registry of active transactions; the GC horizon is the
    /// minimum of its values.
    active: Mutex<BTreeMap<TxnId, Timestamp>>,
    /// Serializes begin's snapshot read against the commit window.
    commit_gate: Mutex<()>,
    next_txn_id: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl TransactionManager {
    /// Create a manager over the given store and lock manager.
    pub fn new(store: Arc<VersionStore>, locks: Arc<LockManager>) -> Self {
        Self {
            clock: LogicalClock::default(),
            store,
            locks,
            active: Mutex::new(BTreeMap::new()),
            commit_gate: Mutex::new(()),
            next_txn_id: AtomicU64::new(1),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    /// Start a transaction. The snapshot is the most recently issued
    /// timestamp; taking it under the commit gate makes begin
    /// indivisible with respect to concurrent commits.
    pub fn begin(&self) -> Transaction {
        let _gate = self.commit_gate.lock();
        let id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let snapshot = self.clock.now();
        self.active.lock().insert(id, snapshot);
        tracing::debug!(txn = id.as_u64(), snapshot = snapshot.as_u64(), "transaction started");
        Transaction::new(id, snapshot)
    }

    /// Read `key` through `txn`: the buffered value if the transaction
    /// wrote the key (read-your-writes), otherwise the version visible
    /// at the transaction's snapshot. `Ok(None)` is a normal negative
    /// result.
    pub fn read(&self, txn: &mut Transaction, key: &Key) -> Result<Option<Value>> {
        txn.ensure_active()?;
        if let Some(value) = txn.pending(key) {
            return Ok(Some(value.clone()));
        }
        match self.store.read(key, txn.snapshot()) {
            Some((value, begin)) => {
                txn.record_read(key.clone(), begin);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Buffer a write. Nothing reaches the store before commit.
    pub fn write(&self, txn: &mut Transaction, key: Key, value: Value) -> Result<()> {
        txn.ensure_active()?;
        txn.stage_write(key, value);
        Ok(())
    }

    /// Commit `txn`. Validates the write-set first-committer-wins, then
    /// installs every buffered write at a freshly issued commit
    /// timestamp. On conflict the transaction aborts and the caller
    /// gets `WriteConflict`; retrying means running the whole
    /// transaction again.
    pub fn commit(&self, txn: &mut Transaction) -> Result<Timestamp> {
        txn.ensure_active()?;

        // read-only fast path: nothing to install, nothing to conflict with
        if txn.write_count() == 0 {
            let snapshot = txn.snapshot();
            self.finish(txn, TransactionState::Committed);
            return Ok(snapshot);
        }

        let outcome = {
            let _gate = self.commit_gate.lock();
            match conflict::validate(txn, &self.store).first() {
                Some(stale) => Err(Error::WriteConflict {
                    key: stale.key.clone(),
                    snapshot: stale.snapshot,
                    head_begin: stale.head_begin,
                }),
                None => {
                    let commit_ts = self.clock.tick();
                    for (key, value) in txn.writes() {
                        self.store.append(key.clone(), value.clone(), commit_ts);
                    }
                    Ok(commit_ts)
                }
            }
        };

        match outcome {
            Ok(commit_ts) => {
                self.finish(txn, TransactionState::Committed);
                tracing::debug!(
                    txn = txn.id().as_u64(),
                    commit_ts = commit_ts.as_u64(),
                    "transaction committed"
                );
                Ok(commit_ts)
            }
            Err(err) => {
                tracing::debug!(txn = txn.id().as_u64(), error = %err, "commit failed, aborting");
                self.finish(txn, TransactionState::Aborted);
                Err(err)
            }
        }
    }

    /// Abort `txn`, discarding buffered writes and releasing held
    /// locks. Aborting an already-aborted transaction is a no-op;
    /// aborting a committed one is an error.
    pub fn abort(&self, txn: &mut Transaction) -> Result<()> {
        match txn.state() {
            TransactionState::Active => {
                self.finish(txn, TransactionState::Aborted);
                tracing::debug!(txn = txn.id().as_u64(), "transaction aborted");
                Ok(())
            }
            TransactionState::Aborted => Ok(()),
            TransactionState::Committed => Err(Error::TransactionNotActive {
                txn: txn.id(),
                state: txn.state().to_string(),
            }),
        }
    }

    /// Acquire `mode` on `resource` for `txn`. A deadlock, timeout, or
    /// protocol violation aborts the transaction before the error is
    /// returned, so the caller is always left in the abort path.
    pub fn lock(&self, txn: &mut Transaction, resource: &ResourceId, mode: LockMode) -> Result<()> {
        txn.ensure_active()?;
        match self.locks.acquire(txn.id(), resource, mode) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(txn, err)),
        }
    }

    /// Release `txn`'s lock on `resource`, entering its shrinking
    /// phase. Releasing a lock that is not held is a contract violation
    /// and aborts the transaction.
    pub fn unlock(&self, txn: &mut Transaction, resource: &ResourceId) -> Result<()> {
        txn.ensure_active()?;
        match self.locks.release(txn.id(), resource) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(txn, err)),
        }
    }

    /// Promote `txn`'s lock on `resource` to Exclusive. Failure aborts
    /// the transaction, like [`lock`](Self::lock).
    pub fn upgrade_lock(&self, txn: &mut Transaction, resource: &ResourceId) -> Result<()> {
        txn.ensure_active()?;
        match self.locks.upgrade(txn.id(), resource) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(txn, err)),
        }
    }

    /// The GC horizon: the minimum snapshot among active transactions,
    /// or the current clock value when none is active. Sampled once per
    /// GC pass.
    pub fn horizon(&self) -> Timestamp {
        let active = self.active.lock();
        active
            .values()
            .copied()
            .min()
            .unwrap_or_else(|| self.clock.now())
    }

    /// Number of active transactions.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Current counters.
    pub fn stats(&self) -> TxnStats {
        TxnStats {
            active: self.active_count(),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }

    /// Terminal bookkeeping shared by every exit path: deregister from
    /// the active set, release locks, discard buffered state.
    fn finish(&self, txn: &mut Transaction, state: TransactionState) {
        debug_assert!(state != TransactionState::Active);
        self.active.lock().remove(&txn.id());
        self.locks.release_all(txn.id());
        match state {
            TransactionState::Committed => {
                txn.mark_committed();
                self.committed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                txn.mark_aborted();
                self.aborted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Force `txn` into the abort path and hand the error back.
    fn fail(&self, txn: &mut Transaction, err: Error) -> Error {
        tracing::debug!(txn = txn.id().as_u64(), error = %err, "lock failure, aborting transaction");
        self.finish(txn, TransactionState::Aborted);
        err
    }
}
