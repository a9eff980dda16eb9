//! Lock modes and the compatibility matrix

use std::fmt;

/// Lock mode requested on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared read access; coexists with other readers.
    Shared,
    /// Exclusive access; excludes every other mode.
    Exclusive,
    /// Intention to take Shared locks below this resource.
    IntentionShared,
    /// Intention to take Exclusive locks below this resource.
    IntentionExclusive,
}

impl LockMode {
    /// The fixed compatibility matrix. Symmetric: an Exclusive holder
    /// excludes every other mode, and IntentionExclusive coexists only
    /// with IntentionShared.
    pub fn compatible_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (Exclusive, _) | (_, Exclusive) => false,
            (Shared, Shared) => true,
            (Shared, IntentionShared) | (IntentionShared, Shared) => true,
            (IntentionShared, IntentionShared) => true,
            (IntentionShared, IntentionExclusive) | (IntentionExclusive, IntentionShared) => true,
            (Shared, IntentionExclusive) | (IntentionExclusive, Shared) => false,
            (IntentionExclusive, IntentionExclusive) => false,
        }
    }

    /// Whether already holding `self` satisfies a request for `other`,
    /// making the re-acquire a no-op.
    pub fn covers(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (a, b) if a == b => true,
            (Exclusive, _) => true,
            (Shared, IntentionShared) => true,
            (IntentionExclusive, IntentionShared) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = match self {
            LockMode::Shared => "S",
            LockMode::Exclusive => "X",
            LockMode::IntentionShared => "IS",
            LockMode::IntentionExclusive => "IX",
        };
        write!(f, "{}", short)
    }
}
