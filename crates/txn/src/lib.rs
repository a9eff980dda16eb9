//! Transaction layer
//!
//! This crate implements snapshot-isolated transactions over the version
//! store, with optional two-phase locking through the lock manager:
//! - Transaction: snapshot, state machine, buffered write-set, read-set
//! - conflict: first-committer-wins validation against chain heads
//! - TransactionManager: begin/read/write/commit/abort orchestration,
//!   timestamp allocation, horizon computation, lock delegation
//! - maintenance: cancellable periodic tasks for GC and deadlock sweeps
//!
//! Isolation level is snapshot isolation: a transaction observes one
//! consistent point-in-time view for its entire duration, and the first
//! committer wins on write-write conflicts. Write skew across disjoint
//! keys is not detected.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod maintenance;
pub mod manager;
pub mod transaction;

pub use maintenance::PeriodicTask;
pub use manager::{TransactionManager, TxnStats};
pub use transaction::{Transaction, TransactionState};
