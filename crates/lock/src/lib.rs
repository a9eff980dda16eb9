//! Two-phase locking layer
//!
//! This crate implements the lock manager and its deadlock machinery:
//! - LockMode: the fixed, symmetric compatibility matrix
//! - LockManager: per-resource lock tables, FIFO wait queues with
//!   upgrade priority, blocking acquisition with timeout, strict
//!   two-phase discipline
//! - WaitForGraph: blocking dependencies between transactions
//! - DeadlockDetector: cycle search and victim selection
//!
//! Structural edits (holder sets, queues, graph edges) hold exclusive
//! access only for the duration of the edit; a blocked acquire parks on
//! its own condvar slot and holds no shared guard while waiting.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod deadlock;
pub mod manager;
pub mod mode;
mod table;
pub mod waitfor;

pub use deadlock::{DeadlockDetector, VictimPolicy};
pub use manager::{LockConfig, LockManager, LockStats};
pub use mode::LockMode;
pub use waitfor::WaitForGraph;
