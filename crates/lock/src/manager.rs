//! Lock manager
//!
//! Per-resource lock tables with blocking acquisition, a fixed
//! compatibility matrix, FIFO wait queues with upgrade priority, strict
//! two-phase discipline, and deadlock resolution.
//!
//! Locking discipline inside the manager: a table entry guard is held
//! only for structural edits, never across a blocking wait. The graph
//! mutex and the waiting map are only taken while holding a table guard
//! or alone, so guard order is acyclic. A blocked request parks on its
//! own [`WaitSlot`](crate::table::WaitSlot); whichever of grant, victim
//! selection, or timeout resolves the slot first wins, and the losers
//! observe the decision instead of re-resolving it.

use crate::deadlock::{DeadlockDetector, VictimPolicy};
use crate::mode::LockMode;
use crate::table::{LockTable, WaitOutcome, WaitSlot, Waiter};
use crate::waitfor::WaitForGraph;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidemark_core::{Error, ResourceId, Result, TxnId};

/// Tuning knobs for lock acquisition.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a blocked acquire waits before failing with LockTimeout.
    pub wait_timeout: Duration,
    /// Run deadlock detection on every blocking acquire. When off,
    /// detection falls to the periodic sweep alone.
    pub detect_on_block: bool,
    /// Victim selection policy for detected cycles.
    pub victim_policy: VictimPolicy,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            detect_on_block: true,
            victim_policy: VictimPolicy::default(),
        }
    }
}

/// Per-transaction lock bookkeeping.
#[derive(Debug, Default)]
struct TxnLocks {
    /// Resources this transaction currently holds a lock on.
    held: HashSet<ResourceId>,
    /// Set by the first release; any later acquire is a protocol
    /// violation (two-phase: the growing phase closed).
    shrinking: bool,
}

/// Counters describing current lock manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    /// Resources with at least one holder or waiter.
    pub resources: usize,
    /// Requests currently blocked.
    pub waiting: usize,
    /// Edges in the wait-for graph.
    pub wait_edges: usize,
}

/// Blocking two-phase lock manager.
///
/// Thread-safe; share behind an `Arc`. One logical operation at a time
/// per transaction: a transaction's own acquire blocks its calling
/// thread, so a transaction never races itself.
pub struct LockManager {
    tables: DashMap<ResourceId, LockTable>,
    txns: DashMap<TxnId, TxnLocks>,
    /// Slots of currently blocked requests, for victim signalling.
    waiting: DashMap<TxnId, Arc<WaitSlot>>,
    graph: WaitForGraph,
    detector: DeadlockDetector,
    config: LockConfig,
}

impl LockManager {
    /// Create a lock manager with the given configuration.
    pub fn new(config: LockConfig) -> Self {
        Self {
            tables: DashMap::new(),
            txns: DashMap::new(),
            waiting: DashMap::new(),
            graph: WaitForGraph::new(),
            detector: DeadlockDetector::new(config.victim_policy),
            config,
        }
    }

    /// Acquire `mode` on `resource` for `txn`, blocking while the mode
    /// is incompatible with a current holder.
    ///
    /// Grants immediately when compatible with every holder. A request
    /// by a transaction that already holds a covering mode is a no-op;
    /// a stronger request routes through the upgrade path. Fails with
    /// `ProtocolViolation` once the transaction has released any lock,
    /// `Deadlock` when selected as a victim, or `LockTimeout` after the
    /// configured wait.
    pub fn acquire(&self, txn: TxnId, resource: &ResourceId, mode: LockMode) -> Result<()> {
        self.ensure_growing(txn)?;

        let slot = {
            let mut table = self.tables.entry(resource.clone()).or_default();
            if let Some(held) = table.holders.get(&txn).copied() {
                if held.covers(mode) {
                    return Ok(());
                }
                // stronger than what is held: promote
                if table.admits(txn, mode) {
                    table.holders.insert(txn, mode);
                    return Ok(());
                }
                self.enqueue_waiter(&mut table, txn, resource, mode, true)
            } else if table.admits(txn, mode) {
                table.holders.insert(txn, mode);
                self.txns.entry(txn).or_default().held.insert(resource.clone());
                return Ok(());
            } else {
                self.enqueue_waiter(&mut table, txn, resource, mode, false)
            }
        };

        if self.config.detect_on_block {
            self.run_detection();
        }
        self.wait(txn, resource, slot)
    }

    /// Release `txn`'s lock on `resource`, closing its growing phase,
    /// then grant the longest compatible prefix of the wait queue.
    pub fn release(&self, txn: TxnId, resource: &ResourceId) -> Result<()> {
        {
            let Some(mut state) = self.txns.get_mut(&txn) else {
                return Err(Error::LockNotHeld {
                    txn,
                    resource: resource.clone(),
                });
            };
            if !state.held.remove(resource) {
                return Err(Error::LockNotHeld {
                    txn,
                    resource: resource.clone(),
                });
            }
            state.shrinking = true;
        }
        self.release_inner(txn, resource);
        Ok(())
    }

    /// Promote `txn`'s lock on `resource` to Exclusive. The sole holder
    /// promotes in place; otherwise the request waits ahead of every
    /// plain waiter until the remaining holders depart.
    pub fn upgrade(&self, txn: TxnId, resource: &ResourceId) -> Result<()> {
        self.ensure_growing(txn)?;

        let slot = {
            let Some(mut table) = self.tables.get_mut(resource) else {
                return Err(Error::LockNotHeld {
                    txn,
                    resource: resource.clone(),
                });
            };
            if !table.holders.contains_key(&txn) {
                return Err(Error::LockNotHeld {
                    txn,
                    resource: resource.clone(),
                });
            }
            if table.admits(txn, LockMode::Exclusive) {
                table.holders.insert(txn, LockMode::Exclusive);
                return Ok(());
            }
            self.enqueue_waiter(&mut table, txn, resource, LockMode::Exclusive, true)
        };

        if self.config.detect_on_block {
            self.run_detection();
        }
        self.wait(txn, resource, slot)
    }

    /// Release everything `txn` holds and drop its bookkeeping; called
    /// at transaction termination. Safe to call for a transaction that
    /// never locked anything.
    pub fn release_all(&self, txn: TxnId) {
        let held: Vec<ResourceId> = match self.txns.remove(&txn) {
            Some((_, state)) => state.held.into_iter().collect(),
            None => return,
        };
        for resource in held {
            self.release_inner(txn, &resource);
        }
        self.graph.clear(txn);
        self.waiting.remove(&txn);
    }

    /// Run one deadlock detection pass; if a cycle exists, signal its
    /// victim and return it. A victim whose request resolved in the
    /// meantime is skipped; the next pass retries.
    pub fn run_detection(&self) -> Option<TxnId> {
        let victim = self.detector.find_victim(&self.graph)?;
        let slot = {
            let entry = self.waiting.get(&victim)?;
            Arc::clone(entry.value())
        };
        if slot.resolve(WaitOutcome::Victim) {
            Some(victim)
        } else {
            None
        }
    }

    /// Whether `txn` currently holds a lock on `resource`.
    pub fn holds(&self, txn: TxnId, resource: &ResourceId) -> bool {
        self.txns
            .get(&txn)
            .map_or(false, |state| state.held.contains(resource))
    }

    /// The mode `txn` holds on `resource`, if any.
    pub fn held_mode(&self, txn: TxnId, resource: &ResourceId) -> Option<LockMode> {
        self.tables
            .get(resource)
            .and_then(|table| table.holders.get(&txn).copied())
    }

    /// Current counters.
    pub fn stats(&self) -> LockStats {
        LockStats {
            resources: self.tables.len(),
            waiting: self.waiting.len(),
            wait_edges: self.graph.edge_count(),
        }
    }

    fn ensure_growing(&self, txn: TxnId) -> Result<()> {
        let shrinking = self.txns.get(&txn).map_or(false, |state| state.shrinking);
        if shrinking {
            return Err(Error::ProtocolViolation { txn });
        }
        Ok(())
    }

    /// Queue a blocked request and publish its wait-for edges. Caller
    /// holds the table guard.
    fn enqueue_waiter(
        &self,
        table: &mut LockTable,
        txn: TxnId,
        resource: &ResourceId,
        mode: LockMode,
        upgrade: bool,
    ) -> Arc<WaitSlot> {
        let slot = Arc::new(WaitSlot::default());
        let blockers = table.blockers(txn, mode);
        table.enqueue(Waiter {
            txn,
            mode,
            upgrade,
            slot: Arc::clone(&slot),
        });
        self.waiting.insert(txn, Arc::clone(&slot));
        self.graph.add_waits(txn, resource, &blockers);
        tracing::debug!(
            txn = txn.as_u64(),
            resource = resource.as_str(),
            mode = %mode,
            upgrade,
            blockers = blockers.len(),
            "lock request blocked"
        );
        slot
    }

    /// Park on `slot` until a decision arrives or the deadline passes.
    fn wait(&self, txn: TxnId, resource: &ResourceId, slot: Arc<WaitSlot>) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.config.wait_timeout;

        let mut outcome = {
            let mut state = slot.state.lock();
            while *state == WaitOutcome::Waiting {
                if slot.resolved.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            *state
        };

        if outcome == WaitOutcome::Waiting {
            // Deadline passed. Resolve under the table guard so a grant
            // racing the timeout wins and is honored.
            let table = self.tables.get_mut(resource);
            let mut state = slot.state.lock();
            if *state == WaitOutcome::Waiting {
                *state = WaitOutcome::TimedOut;
                if let Some(mut table) = table {
                    table.remove_waiter(txn);
                }
            }
            outcome = *state;
        }

        match outcome {
            WaitOutcome::Granted => {
                self.txns.entry(txn).or_default().held.insert(resource.clone());
                Ok(())
            }
            WaitOutcome::Victim => {
                if let Some(mut table) = self.tables.get_mut(resource) {
                    table.remove_waiter(txn);
                }
                self.graph.clear_waits(txn, resource);
                self.waiting.remove(&txn);
                Err(Error::Deadlock { txn })
            }
            WaitOutcome::TimedOut => {
                self.graph.clear_waits(txn, resource);
                self.waiting.remove(&txn);
                let waited_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(
                    txn = txn.as_u64(),
                    resource = resource.as_str(),
                    waited_ms,
                    "lock request timed out"
                );
                Err(Error::LockTimeout {
                    txn,
                    resource: resource.clone(),
                    waited_ms,
                })
            }
            WaitOutcome::Waiting => unreachable!("wait resolved without a decision"),
        }
    }

    /// Remove `txn` from the holders of `resource` and re-evaluate the
    /// queue.
    fn release_inner(&self, txn: TxnId, resource: &ResourceId) {
        {
            let Some(mut table) = self.tables.get_mut(resource) else {
                return;
            };
            if table.holders.remove(&txn).is_none() {
                return;
            }
            // queued requests no longer wait on the departed holder
            for waiter in table.queue.iter() {
                self.graph.remove_edge(waiter.txn, resource, txn);
            }
            self.grant_front(&mut table, resource);
        }
        self.tables.remove_if(resource, |_, table| table.is_idle());
    }

    /// Grant the longest compatible prefix of the wait queue, batching
    /// mutually compatible waiters. Caller holds the table guard.
    fn grant_front(&self, table: &mut LockTable, resource: &ResourceId) {
        while let Some(front) = table.queue.front() {
            if !table.admits(front.txn, front.mode) {
                break;
            }
            let waiter = table.queue.pop_front().expect("front exists");
            if !waiter.slot.resolve(WaitOutcome::Granted) {
                // lost to a timeout or victim decision; the waiter's own
                // thread cleans up its edges and bookkeeping
                continue;
            }
            table.holders.insert(waiter.txn, waiter.mode);
            self.graph.clear_waits(waiter.txn, resource);
            self.waiting.remove(&waiter.txn);
            tracing::debug!(
                txn = waiter.txn.as_u64(),
                resource = resource.as_str(),
                mode = %waiter.mode,
                "queued lock request granted"
            );
        }
    }
}
