//! Shared logical clock
//!
//! One monotonic counter issues every timestamp in the system. Snapshots
//! observe the most recently issued value (`now`); commits issue the next
//! one (`tick`). Because `tick` is a single indivisible increment, two
//! commits can never receive the same timestamp and issuance order is
//! total.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing timestamp source.
///
/// Shared by the transaction manager for both snapshot and commit
/// timestamps. Cheap to share behind an `Arc`; all operations are
/// lock-free.
#[derive(Debug)]
pub struct LogicalClock {
    /// The most recently issued timestamp value.
    last: AtomicU64,
}

impl LogicalClock {
    /// Create a clock whose last issued value is `initial`.
    pub fn new(initial: u64) -> Self {
        Self {
            last: AtomicU64::new(initial),
        }
    }

    /// Observe the most recently issued timestamp without advancing.
    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.last.load(Ordering::SeqCst))
    }

    /// Issue the next timestamp. Indivisible: concurrent callers each
    /// receive a distinct, strictly increasing value.
    pub fn tick(&self) -> Timestamp {
        Timestamp::new(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        // Start at 1 so Timestamp::ZERO precedes every issued value
        Self::new(1)
    }
}
