//! Core types for the tidemark transactional core
//!
//! This crate defines the foundational types used throughout the system:
//! - TxnId: Unique identifier for a transaction
//! - Timestamp: Totally ordered logical clock value
//! - Key / ResourceId: Identifiers for versioned data and lockable resources
//! - Value: Unified value enum for stored data
//! - LogicalClock: The single shared timestamp source
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use clock::LogicalClock;
pub use error::{Error, Result};
pub use types::{Key, ResourceId, Timestamp, TxnId, Value};
