//! Per-resource lock state
//!
//! A `LockTable` is one resource's holders plus its FIFO wait queue.
//! Tables are plain data; the manager edits them under the owning map
//! entry's exclusive guard. Blocked requests park on a `WaitSlot`, a
//! one-shot condvar cell resolved exactly once by whichever event wins:
//! a grant, victim selection, or the waiter's own timeout.

use crate::mode::LockMode;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tidemark_core::TxnId;

/// Terminal decision for a blocked lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum WaitOutcome {
    /// Still parked.
    #[default]
    Waiting,
    /// Lock granted; holders already updated by the granter.
    Granted,
    /// Selected as deadlock victim.
    Victim,
    /// The waiter resolved itself after its deadline passed.
    TimedOut,
}

/// One-shot synchronization cell a blocked acquire parks on.
#[derive(Debug, Default)]
pub(crate) struct WaitSlot {
    pub(crate) state: Mutex<WaitOutcome>,
    pub(crate) resolved: Condvar,
}

impl WaitSlot {
    /// Resolve to `outcome` if still waiting. Returns false when another
    /// decision already won the race.
    pub(crate) fn resolve(&self, outcome: WaitOutcome) -> bool {
        let mut state = self.state.lock();
        if *state != WaitOutcome::Waiting {
            return false;
        }
        *state = outcome;
        self.resolved.notify_one();
        true
    }
}

/// A queued lock request.
#[derive(Debug, Clone)]
pub(crate) struct Waiter {
    pub(crate) txn: TxnId,
    pub(crate) mode: LockMode,
    /// Promotion of a mode this transaction already holds; served before
    /// every plain request to avoid upgrade starvation.
    pub(crate) upgrade: bool,
    pub(crate) slot: Arc<WaitSlot>,
}

/// Lock state for one resource.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    /// Current holders, one mode per transaction.
    pub(crate) holders: HashMap<TxnId, LockMode>,
    /// FIFO queue of blocked requests; upgrades sit ahead of plain ones.
    pub(crate) queue: VecDeque<Waiter>,
}

impl LockTable {
    /// Whether `mode` is compatible with every holder other than the
    /// requester itself (an upgrader's own held mode never blocks it).
    pub(crate) fn admits(&self, requester: TxnId, mode: LockMode) -> bool {
        self.holders
            .iter()
            .all(|(txn, held)| *txn == requester || mode.compatible_with(*held))
    }

    /// Holders whose mode conflicts with `mode`: the wait-for targets
    /// of a request that has to block.
    pub(crate) fn blockers(&self, requester: TxnId, mode: LockMode) -> Vec<TxnId> {
        self.holders
            .iter()
            .filter(|(txn, held)| **txn != requester && !mode.compatible_with(**held))
            .map(|(txn, _)| *txn)
            .collect()
    }

    /// Queue a waiter. Upgrades are inserted ahead of every non-upgrade
    /// waiter but behind earlier upgrades, preserving FIFO order within
    /// each class.
    pub(crate) fn enqueue(&mut self, waiter: Waiter) {
        if waiter.upgrade {
            let pos = self
                .queue
                .iter()
                .position(|queued| !queued.upgrade)
                .unwrap_or(self.queue.len());
            self.queue.insert(pos, waiter);
        } else {
            self.queue.push_back(waiter);
        }
    }

    /// Drop `txn`'s queued request, if any. Returns whether one existed.
    pub(crate) fn remove_waiter(&mut self, txn: TxnId) -> bool {
        match self.queue.iter().position(|waiter| waiter.txn == txn) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether the table carries no state and can be dropped.
    pub(crate) fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.queue.is_empty()
    }
}
