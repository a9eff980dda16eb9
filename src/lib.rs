//! Tidemark: a transactional concurrency-control core
//!
//! Tidemark combines a multi-version store (snapshot isolation with
//! first-committer-wins conflict detection), a two-phase lock manager
//! with a fixed compatibility matrix, a wait-for-graph deadlock
//! detector, and horizon-based garbage collection of superseded
//! versions.
//!
//! # Quick Start
//!
//! ```
//! use tidemark::{Key, Tidemark, Value};
//!
//! let db = Tidemark::new();
//!
//! let mut txn = db.begin();
//! db.write(&mut txn, Key::from("user:1"), Value::String("alice".into())).unwrap();
//! db.commit(&mut txn).unwrap();
//!
//! let mut reader = db.begin();
//! let value = db.read(&mut reader, &Key::from("user:1")).unwrap();
//! assert_eq!(value, Some(Value::String("alice".into())));
//! ```
//!
//! # Architecture
//!
//! The [`Tidemark`] handle wires the member crates together and owns
//! the optional background maintenance tasks (GC and deadlock sweep).
//! Everything is in-process; durability, distribution, and query
//! surfaces live elsewhere.
//!
//! Errors follow a small taxonomy: [`Error::WriteConflict`],
//! [`Error::Deadlock`], and [`Error::LockTimeout`] are retryable
//! contention outcomes; the rest are contract violations. A missing key
//! is not an error; reads return `Option::None`.

mod db;

pub use db::{Tidemark, TidemarkConfig};
pub use tidemark_core::{Error, Key, LogicalClock, ResourceId, Result, Timestamp, TxnId, Value};
pub use tidemark_lock::{LockConfig, LockManager, LockMode, LockStats, VictimPolicy};
pub use tidemark_mvcc::{GcStats, VersionStore};
pub use tidemark_txn::{Transaction, TransactionManager, TransactionState, TxnStats};
