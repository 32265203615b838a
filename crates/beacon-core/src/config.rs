//! Configuration for Beacon
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration of one logical registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Heartbeat cadence in seconds
    ///
    /// Entries older than `HEARTBEAT_EXPIRY_PERIODS_COUNT` periods are evicted
    /// by the next heartbeat.
    #[serde(default = "default_heartbeat_delay_secs")]
    pub heartbeat_delay_secs: u64,

    /// Safety TTL attached to every record write (seconds)
    #[serde(default = "default_record_ttl_secs")]
    pub record_ttl_secs: u64,

    /// CAS attempts per mutating call before giving up
    #[serde(default = "default_cas_attempts_max")]
    pub cas_attempts_max: u32,

    /// Wall-clock cap on one CAS loop (milliseconds)
    #[serde(default = "default_cas_deadline_ms")]
    pub cas_deadline_ms: u64,
}

fn default_heartbeat_delay_secs() -> u64 {
    HEARTBEAT_DELAY_SECS_DEFAULT
}

fn default_record_ttl_secs() -> u64 {
    RECORD_TTL_SECS_DEFAULT
}

fn default_cas_attempts_max() -> u32 {
    CAS_ATTEMPTS_COUNT_DEFAULT
}

fn default_cas_deadline_ms() -> u64 {
    CAS_DEADLINE_MS_DEFAULT
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_delay_secs: default_heartbeat_delay_secs(),
            record_ttl_secs: default_record_ttl_secs(),
            cas_attempts_max: default_cas_attempts_max(),
            cas_deadline_ms: default_cas_deadline_ms(),
        }
    }
}

impl RegistryConfig {
    /// Create a configuration with the given heartbeat cadence
    pub fn with_heartbeat_delay_secs(mut self, secs: u64) -> Self {
        self.heartbeat_delay_secs = secs;
        self
    }

    /// Set the CAS retry budget
    pub fn with_cas_attempts_max(mut self, attempts: u32) -> Self {
        self.cas_attempts_max = attempts;
        self
    }

    /// Set the wall-clock cap on one CAS loop
    pub fn with_cas_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.cas_deadline_ms = deadline_ms;
        self
    }

    /// Age in milliseconds past which an entry is considered expired
    pub fn expiry_threshold_ms(&self) -> u64 {
        self.heartbeat_delay_secs
            .saturating_mul(HEARTBEAT_EXPIRY_PERIODS_COUNT)
            .saturating_mul(1000)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_delay_secs < HEARTBEAT_DELAY_SECS_MIN
            || self.heartbeat_delay_secs > HEARTBEAT_DELAY_SECS_MAX
        {
            return Err(Error::InvalidConfiguration {
                field: "heartbeat_delay_secs".into(),
                reason: format!(
                    "{} outside [{}, {}]",
                    self.heartbeat_delay_secs, HEARTBEAT_DELAY_SECS_MIN, HEARTBEAT_DELAY_SECS_MAX
                ),
            });
        }

        if self.record_ttl_secs <= self.heartbeat_delay_secs * HEARTBEAT_EXPIRY_PERIODS_COUNT {
            return Err(Error::InvalidConfiguration {
                field: "record_ttl_secs".into(),
                reason: format!(
                    "{} must exceed the expiry threshold of {} secs",
                    self.record_ttl_secs,
                    self.heartbeat_delay_secs * HEARTBEAT_EXPIRY_PERIODS_COUNT
                ),
            });
        }

        if self.cas_attempts_max == 0 || self.cas_attempts_max > CAS_ATTEMPTS_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "cas_attempts_max".into(),
                reason: format!(
                    "{} outside [1, {}]",
                    self.cas_attempts_max, CAS_ATTEMPTS_COUNT_MAX
                ),
            });
        }

        if self.cas_deadline_ms == 0 || self.cas_deadline_ms > CAS_DEADLINE_MS_MAX {
            return Err(Error::InvalidConfiguration {
                field: "cas_deadline_ms".into(),
                reason: format!(
                    "{} outside [1, {}]",
                    self.cas_deadline_ms, CAS_DEADLINE_MS_MAX
                ),
            });
        }

        Ok(())
    }
}
