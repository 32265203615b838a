//! TigerStyle constants for Beacon
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Registry Keys
// =============================================================================

/// Store key of the client node registry
pub const REGISTRY_KEY_CLIENT_NODES: &str = "client_nodes";

/// Store key of the event node registry
pub const REGISTRY_KEY_EVENT_NODES: &str = "event_nodes";

/// Maximum length of a registry key in bytes
pub const REGISTRY_KEY_LENGTH_BYTES_MAX: usize = 256;

// =============================================================================
// Node Limits
// =============================================================================

/// Maximum length of a node URL in bytes
pub const NODE_URL_LENGTH_BYTES_MAX: usize = 2048;

/// Maximum number of slots in one registry
///
/// Slot lookup is a linear scan; registries are expected to hold tens of nodes.
pub const REGISTRY_SLOTS_COUNT_MAX: usize = 4096;

// =============================================================================
// Heartbeat
// =============================================================================

/// Default heartbeat cadence in seconds
pub const HEARTBEAT_DELAY_SECS_DEFAULT: u64 = 5;

/// Minimum heartbeat cadence in seconds
pub const HEARTBEAT_DELAY_SECS_MIN: u64 = 1;

/// Maximum heartbeat cadence in seconds (1 hour)
pub const HEARTBEAT_DELAY_SECS_MAX: u64 = 60 * 60;

/// Number of missed heartbeat periods after which a node is evicted
pub const HEARTBEAT_EXPIRY_PERIODS_COUNT: u64 = 2;

// =============================================================================
// Record Storage
// =============================================================================

/// Safety TTL attached to every record write (30 days)
pub const RECORD_TTL_SECS_DEFAULT: u64 = 30 * 24 * 60 * 60;

/// Maximum encoded record size in bytes (1 MB)
pub const RECORD_SIZE_BYTES_MAX: usize = 1024 * 1024;

// =============================================================================
// CAS Retry Loop
// =============================================================================

/// Default number of CAS attempts per mutating call
pub const CAS_ATTEMPTS_COUNT_DEFAULT: u32 = 5;

/// Maximum configurable number of CAS attempts per mutating call
pub const CAS_ATTEMPTS_COUNT_MAX: u32 = 64;

/// Default wall-clock cap on one CAS loop in milliseconds (10 sec)
pub const CAS_DEADLINE_MS_DEFAULT: u64 = 10 * 1000;

/// Maximum wall-clock cap on one CAS loop in milliseconds (2 min)
pub const CAS_DEADLINE_MS_MAX: u64 = 2 * 60 * 1000;

// Compile-time assertions for constant validity
const _: () = {
    assert!(HEARTBEAT_DELAY_SECS_MIN <= HEARTBEAT_DELAY_SECS_DEFAULT);
    assert!(HEARTBEAT_DELAY_SECS_DEFAULT <= HEARTBEAT_DELAY_SECS_MAX);
    assert!(HEARTBEAT_EXPIRY_PERIODS_COUNT >= 1);
    assert!(CAS_ATTEMPTS_COUNT_DEFAULT >= 1);
    assert!(CAS_ATTEMPTS_COUNT_DEFAULT <= CAS_ATTEMPTS_COUNT_MAX);
    assert!(CAS_DEADLINE_MS_DEFAULT <= CAS_DEADLINE_MS_MAX);
    // A record must outlive many heartbeat periods
    assert!(RECORD_TTL_SECS_DEFAULT > HEARTBEAT_DELAY_SECS_MAX * HEARTBEAT_EXPIRY_PERIODS_COUNT);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ttl_is_thirty_days() {
        assert_eq!(RECORD_TTL_SECS_DEFAULT, 2_592_000);
    }

    #[test]
    fn test_limits_have_units_in_names() {
        // All byte limits end in _BYTES_, time limits in _MS_/_SECS_, counts in _COUNT_
        let _: usize = REGISTRY_KEY_LENGTH_BYTES_MAX;
        let _: u64 = CAS_DEADLINE_MS_DEFAULT;
        let _: u32 = CAS_ATTEMPTS_COUNT_DEFAULT;
        let _: usize = REGISTRY_SLOTS_COUNT_MAX;
    }
}
