//! Store adapter trait
//!
//! TigerStyle: Minimal capability interface, one record per key.
//!
//! A registry needs exactly three things from its backing store: read a
//! record with its version token, replace it iff the token is unchanged,
//! and delete it. Everything else (slot layout, expiry, retries) lives
//! above this seam.

use async_trait::async_trait;
use beacon_core::{Result, SlotTable, Version, Versioned};
use std::sync::Arc;

/// Atomic single-record storage
///
/// Implementations must make `compare_and_swap` atomic with respect to every
/// other writer of the same key, including writers in other processes.
/// Backend-native errors are folded into `beacon_core::Error` before they
/// leave the adapter.
#[async_trait]
pub trait StoreAdapter: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs and errors
    fn name(&self) -> &'static str;

    /// Read the record stored under `key`
    ///
    /// Returns `None` if the record is absent or its safety TTL has elapsed.
    async fn fetch(&self, key: &str) -> Result<Option<Versioned<SlotTable>>>;

    /// Replace the record under `key` iff its version still equals `expected`
    ///
    /// `expected == None` means "only if the key is absent" (first insert).
    /// `new_version` is the caller's proposed token; backends with a native
    /// CAS cursor may assign their own instead. Returns `Ok(false)` and
    /// leaves the store unchanged when the comparison fails.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Version>,
        table: &SlotTable,
        new_version: Version,
        ttl_secs: u64,
    ) -> Result<bool>;

    /// Unconditionally delete the record under `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether single-node removal is permitted on this backend
    fn supports_remove(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: StoreAdapter + ?Sized> StoreAdapter for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch(&self, key: &str) -> Result<Option<Versioned<SlotTable>>> {
        (**self).fetch(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Version>,
        table: &SlotTable,
        new_version: Version,
        ttl_secs: u64,
    ) -> Result<bool> {
        (**self)
            .compare_and_swap(key, expected, table, new_version, ttl_secs)
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    fn supports_remove(&self) -> bool {
        (**self).supports_remove()
    }
}
