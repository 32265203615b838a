//! Optimistic Concurrency Control primitives
//!
//! TigerStyle: Explicit OCC types for compare-and-swap over whole records.
//!
//! Every registry mutation follows the same three phases:
//! 1. Read phase: fetch the record together with its version token
//! 2. Transform phase: compute the new record from the one just read (pure)
//! 3. Commit phase: compare-and-swap, applied iff the version is unchanged
//!
//! A lost commit restarts from phase 1. The transform being free of side
//! effects is what makes a restart safe.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Version
// =============================================================================

/// Version token for optimistic concurrency control
///
/// Opaque to the registry: backends may store an update timestamp
/// or a backend-native CAS cursor. The only operation the registry
/// relies on is equality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// Create a new version
    pub const fn new(v: u64) -> Self {
        Version(v)
    }

    /// Get the raw version number
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Increment version for a write operation
    pub fn increment(&self) -> Self {
        Version(self.0.saturating_add(1))
    }

    /// Propose the token for a write that replaces `expected`
    ///
    /// Uses the write timestamp, bumped past `expected` so two writes in the
    /// same millisecond never share a token.
    pub fn next_after(expected: Option<Version>, now_ms: u64) -> Self {
        let floor = expected.map(|v| v.increment().0).unwrap_or(1);
        let next = Version(now_ms.max(floor));

        debug_assert!(expected.map_or(true, |v| next > v));
        next
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// =============================================================================
// Versioned Value
// =============================================================================

/// A value with its version for OCC
///
/// Used to track the version at read time for conflict detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The value
    pub value: T,
    /// The version when this value was read
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Create a new versioned value
    pub fn new(value: T, version: Version) -> Self {
        Versioned { value, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_increment() {
        let v0 = Version::default();
        let v1 = v0.increment();
        let v2 = v1.increment();

        assert_eq!(v0.value(), 0);
        assert_eq!(v1.value(), 1);
        assert_eq!(v2.value(), 2);
    }

    #[test]
    fn test_next_after_uses_timestamp() {
        let next = Version::next_after(Some(Version::new(1_000)), 5_000);
        assert_eq!(next, Version::new(5_000));
    }

    #[test]
    fn test_next_after_same_millisecond() {
        // Clock has not moved since the previous write
        let prev = Version::new(5_000);
        let next = Version::next_after(Some(prev), 5_000);
        assert_eq!(next, Version::new(5_001));
        assert_ne!(next, prev);
    }

    #[test]
    fn test_next_after_clock_behind() {
        let next = Version::next_after(Some(Version::new(9_000)), 4_000);
        assert_eq!(next, Version::new(9_001));
    }

    #[test]
    fn test_next_after_first_write() {
        assert_eq!(Version::next_after(None, 0), Version::new(1));
        assert_eq!(Version::next_after(None, 42), Version::new(42));
    }
}
