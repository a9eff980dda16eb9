//! Wait-for graph
//!
//! Directed edges waiter → holder, one set per contested resource. An
//! edge exists iff a transaction is currently blocked on a resource held
//! in an incompatible mode by another transaction. All mutation happens
//! behind one mutex held only for the duration of the structural edit;
//! cycle search snapshots the adjacency and releases the lock before
//! traversing.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tidemark_core::{ResourceId, TxnId};

/// Per-waiter edge targets, grouped by the resource the wait is tied to.
type EdgeSet = FxHashMap<ResourceId, SmallVec<[TxnId; 2]>>;

/// Blocking dependencies between transactions.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: Mutex<FxHashMap<TxnId, EdgeSet>>,
}

impl WaitForGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` blocks on `resource` held by each of
    /// `holders`.
    pub fn add_waits(&self, waiter: TxnId, resource: &ResourceId, holders: &[TxnId]) {
        if holders.is_empty() {
            return;
        }
        let mut edges = self.edges.lock();
        let targets = edges
            .entry(waiter)
            .or_default()
            .entry(resource.clone())
            .or_default();
        for holder in holders {
            if !targets.contains(holder) {
                targets.push(*holder);
            }
        }
    }

    /// Remove the edge waiter → holder tied to `resource`; used when a
    /// holder departs while the waiter stays queued.
    pub fn remove_edge(&self, waiter: TxnId, resource: &ResourceId, holder: TxnId) {
        let mut edges = self.edges.lock();
        let Some(per_resource) = edges.get_mut(&waiter) else {
            return;
        };
        if let Some(targets) = per_resource.get_mut(resource) {
            targets.retain(|txn| *txn != holder);
            if targets.is_empty() {
                per_resource.remove(resource);
            }
        }
        if per_resource.is_empty() {
            edges.remove(&waiter);
        }
    }

    /// Drop every edge `waiter` holds for `resource`; used when the
    /// request resolves (granted, victimized, or timed out).
    pub fn clear_waits(&self, waiter: TxnId, resource: &ResourceId) {
        let mut edges = self.edges.lock();
        if let Some(per_resource) = edges.get_mut(&waiter) {
            per_resource.remove(resource);
            if per_resource.is_empty() {
                edges.remove(&waiter);
            }
        }
    }

    /// Drop every outgoing edge of `txn`; used at transaction
    /// termination.
    pub fn clear(&self, txn: TxnId) {
        self.edges.lock().remove(&txn);
    }

    /// Total number of waiter → holder edges.
    pub fn edge_count(&self) -> usize {
        self.edges
            .lock()
            .values()
            .flat_map(|per_resource| per_resource.values())
            .map(|targets| targets.len())
            .sum()
    }

    /// Find one cycle, if any, by depth-first search from every node
    /// with outgoing edges. Returns the cycle's members.
    pub fn find_cycle(&self) -> Option<Vec<TxnId>> {
        // Snapshot the adjacency so the search holds no lock
        let adjacency: FxHashMap<TxnId, Vec<TxnId>> = {
            let edges = self.edges.lock();
            edges
                .iter()
                .map(|(waiter, per_resource)| {
                    let mut targets: Vec<TxnId> =
                        per_resource.values().flatten().copied().collect();
                    targets.sort_unstable();
                    targets.dedup();
                    (*waiter, targets)
                })
                .collect()
        };

        let mut color: FxHashMap<TxnId, Color> = FxHashMap::default();
        let mut path = Vec::new();
        let mut roots: Vec<TxnId> = adjacency.keys().copied().collect();
        roots.sort_unstable();
        for root in roots {
            if !color.contains_key(&root) {
                if let Some(cycle) = dfs(root, &adjacency, &mut color, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    OnStack,
    Done,
}

fn dfs(
    node: TxnId,
    adjacency: &FxHashMap<TxnId, Vec<TxnId>>,
    color: &mut FxHashMap<TxnId, Color>,
    path: &mut Vec<TxnId>,
) -> Option<Vec<TxnId>> {
    color.insert(node, Color::OnStack);
    path.push(node);
    for &next in adjacency.get(&node).into_iter().flatten() {
        match color.get(&next) {
            Some(Color::OnStack) => {
                let start = path.iter().position(|&member| member == next)
                    .unwrap_or(0);
                return Some(path[start..].to_vec());
            }
            Some(Color::Done) => {}
            None => {
                if let Some(cycle) = dfs(next, adjacency, color, path) {
                    return Some(cycle);
                }
            }
        }
    }
    path.pop();
    color.insert(node, Color::Done);
    None
}
