//! Deadlock detection
//!
//! Consumes the wait-for graph the lock manager maintains. Detection may
//! run inline on every blocking acquire or as a periodic sweep; both
//! implement the same contract, and the manager supports both at once.

use crate::waitfor::WaitForGraph;
use tidemark_core::TxnId;

/// Which cycle member is sacrificed to break a deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VictimPolicy {
    /// Abort the most recently started member (the largest id; ids are
    /// allocated in begin order), minimizing wasted completed work.
    #[default]
    Youngest,
    /// Abort the longest-running member (the smallest id).
    Oldest,
}

impl VictimPolicy {
    /// Pick the victim among the cycle's members.
    pub fn choose(self, cycle: &[TxnId]) -> Option<TxnId> {
        match self {
            VictimPolicy::Youngest => cycle.iter().copied().max(),
            VictimPolicy::Oldest => cycle.iter().copied().min(),
        }
    }
}

/// Cycle search plus victim selection over a wait-for graph.
#[derive(Debug, Clone, Copy)]
pub struct DeadlockDetector {
    policy: VictimPolicy,
}

impl DeadlockDetector {
    /// Create a detector with the given victim policy.
    pub fn new(policy: VictimPolicy) -> Self {
        Self { policy }
    }

    /// Find one deadlock cycle in `graph` and name its victim.
    pub fn find_victim(&self, graph: &WaitForGraph) -> Option<TxnId> {
        let cycle = graph.find_cycle()?;
        let victim = self.policy.choose(&cycle)?;
        tracing::warn!(
            victim = victim.as_u64(),
            cycle_len = cycle.len(),
            "deadlock cycle detected"
        );
        Some(victim)
    }
}

impl Default for DeadlockDetector {
    fn default() -> Self {
        Self::new(VictimPolicy::default())
    }
}
