//! Time abstraction
//!
//! TigerStyle: All clock reads go through an injected provider.
//!
//! Heartbeat timestamps, expiry checks, version tokens and record TTLs are
//! all derived from a `TimeProvider`. Production code uses `WallClockTime`;
//! tests use `ManualClock` and advance it explicitly, so expiration can be
//! tested without sleeping.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// ============================================================================
// Time Provider
// ============================================================================

/// Time provider abstraction
///
/// Never call `SystemTime::now()` directly from registry code.
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Get current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    ///
    /// In production: actual tokio::time::sleep
    /// With a manual clock: advances time and returns immediately
    async fn sleep_ms(&self, ms: u64);

    /// Get monotonic timestamp (for measuring durations)
    fn monotonic_ms(&self) -> u64 {
        self.now_ms()
    }
}

/// Production time provider using wall clock
#[derive(Debug, Clone)]
pub struct WallClockTime {
    /// Process-local origin for monotonic readings
    origin: Instant,
}

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClockTime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }

    fn monotonic_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// ============================================================================
// Manual Clock
// ============================================================================

/// Manually advanced clock for tests
///
/// Time only moves when told to. Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Current time in milliseconds since epoch
    current_time_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the given millisecond timestamp
    pub fn new(start_ms: u64) -> Self {
        Self {
            current_time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance time by the given number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.current_time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the current time (use with caution)
    pub fn set_ms(&self, ms: u64) {
        self.current_time_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        // 2024-01-01T00:00:00Z for predictable test behavior
        Self::new(1_704_067_200_000)
    }
}

#[async_trait]
impl TimeProvider for ManualClock {
    fn now_ms(&self) -> u64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.advance_ms(ms);
    }
}

// ============================================================================
// Tests
// ============================================================================
