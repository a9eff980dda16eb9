//! Foundational identifier and data types
//!
//! This module defines the types shared by every component:
//! - TxnId: transaction identifier, allocated in begin order
//! - Timestamp: logical clock value ordering snapshots and commits
//! - Key: logical key for versioned data
//! - ResourceId: identifier for a lockable resource
//! - Value: stored datum

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a transaction.
///
/// TxnIds are allocated from a monotonic counter at begin, so the numeric
/// order of ids matches the order in which transactions started. The
/// default deadlock victim policy relies on this: the largest id in a
/// cycle names the most recently started transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Create a TxnId from its raw counter value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Totally ordered logical clock value.
///
/// Every snapshot and commit timestamp in the system is a `Timestamp`
/// issued by the shared [`LogicalClock`](crate::clock::LogicalClock).
/// Comparison order is issuance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The smallest timestamp; precedes every issued value.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a Timestamp from its raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical key identifying one versioned datum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    /// Create a key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// View the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a lockable resource.
///
/// Resources are opaque to the lock manager; a resource may name a key,
/// a range, a table, or anything else the caller locks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// View the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unified value type for stored data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}
