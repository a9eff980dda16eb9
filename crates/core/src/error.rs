//! Error types for the tidemark transactional core
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! A missing key is NOT an error: reads return `Option::None` for a key
//! with no visible version.

use crate::types::{ResourceId, Timestamp, TxnId};
use thiserror::Error;

/// Result type alias for tidemark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tidemark transactional core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Commit-time collision: another transaction committed a newer
    /// version of a written key after this transaction's snapshot.
    /// The caller must retry the whole transaction.
    #[error("write conflict on {key}: head committed at {head_begin}, snapshot was {snapshot}")]
    WriteConflict {
        /// The contested key
        key: crate::types::Key,
        /// Snapshot timestamp of the losing transaction
        snapshot: Timestamp,
        /// Begin timestamp of the winning head version
        head_begin: Timestamp,
    },

    /// The transaction was chosen as a deadlock victim and must abort.
    /// The caller may retry.
    #[error("{txn} selected as deadlock victim")]
    Deadlock {
        /// The victim transaction
        txn: TxnId,
    },

    /// A blocked lock request outlived the configured wait timeout.
    /// Treated by callers exactly like a deadlock.
    #[error("{txn} timed out after {waited_ms} ms waiting for {resource}")]
    LockTimeout {
        /// The waiting transaction
        txn: TxnId,
        /// The contested resource
        resource: ResourceId,
        /// How long the request waited, in milliseconds
        waited_ms: u64,
    },

    /// A lock was requested after the transaction's first release.
    /// Two-phase locking forbids this; the violation is a programming
    /// error and is fatal to the offending transaction.
    #[error("{txn} requested a lock after its first release (growing phase closed)")]
    ProtocolViolation {
        /// The offending transaction
        txn: TxnId,
    },

    /// An operation was attempted on a transaction that already reached
    /// a terminal state.
    #[error("{txn} is not active: {state}")]
    TransactionNotActive {
        /// The transaction
        txn: TxnId,
        /// The state it was found in
        state: String,
    },

    /// A lock release named a resource the transaction does not hold.
    #[error("{txn} does not hold a lock on {resource}")]
    LockNotHeld {
        /// The releasing transaction
        txn: TxnId,
        /// The resource named in the release
        resource: ResourceId,
    },
}

impl Error {
    /// Whether the caller may retry the whole transaction after this
    /// error. WriteConflict, Deadlock and LockTimeout are transient
    /// outcomes of contention; the remaining variants are contract
    /// violations and retrying would fail again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::WriteConflict { .. } | Error::Deadlock { .. } | Error::LockTimeout { .. }
        )
    }
}
