//! Multi-version storage layer
//!
//! This crate implements the version store: per-key chains of immutable
//! versions with visibility-aware reads, atomic chain-head installation,
//! and garbage collection of superseded versions.
//!
//! Key properties:
//! - Readers never block each other; a reader never observes a partially
//!   linked chain
//! - Installing a new head takes exclusive access to one key's chain,
//!   never the whole store
//! - A version's visibility interval `[begin, end)` is immutable once
//!   the end is set
//! - Garbage collection frees arena slots; a freed slot is never
//!   followed, so back-references cannot dangle

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gc;
pub mod store;
pub mod version;

pub use gc::{sweep, GcStats};
pub use store::VersionStore;
pub use version::{Version, VersionChain};
