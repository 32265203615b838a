//! In-memory store
//!
//! For testing and single-process deployments.
//!
//! TigerStyle: Backend-native CAS cursor, TTL enforced against injected time.
//!
//! Behaves like a memcached-style `gets`/`cas` store: every successful write
//! is assigned the next value of a store-wide cursor, and the caller's
//! proposed version token is ignored.

use crate::codec::{decode_record, encode_record, StoredRecord};
use crate::store::StoreAdapter;
use async_trait::async_trait;
use beacon_core::{Result, SlotTable, TimeProvider, Version, Versioned, WallClockTime};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// One stored record with its CAS cursor
#[derive(Debug, Clone)]
struct Cell {
    bytes: Bytes,
    cursor: u64,
    expires_at_ms: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    cells: HashMap<String, Cell>,
    /// Last cursor handed out
    cursor: u64,
}

impl MemoryState {
    fn live(&self, key: &str, now_ms: u64) -> Option<&Cell> {
        self.cells.get(key).filter(|c| now_ms < c.expires_at_ms)
    }

    fn next_cursor(&mut self) -> u64 {
        self.cursor += 1;
        self.cursor
    }
}

/// In-memory store with native CAS cursors
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    time: Arc<dyn TimeProvider>,
}

impl MemoryStore {
    /// Create a new in-memory store using wall clock time
    pub fn new() -> Self {
        Self::with_time(Arc::new(WallClockTime::new()))
    }

    /// Create a new in-memory store with injected time
    pub fn with_time(time: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            time,
        }
    }

    /// Overwrite the raw bytes stored under `key`, bypassing the codec
    ///
    /// Used to simulate a record written by a misbehaving client.
    pub async fn put_raw(&self, key: &str, bytes: Bytes) {
        let mut state = self.state.write().await;
        let cursor = state.next_cursor();
        state.cells.insert(
            key.to_string(),
            Cell {
                bytes,
                cursor,
                expires_at_ms: u64::MAX,
            },
        );
    }

    /// Number of live records
    pub async fn len(&self) -> usize {
        let now_ms = self.time.now_ms();
        let state = self.state.read().await;
        state
            .cells
            .values()
            .filter(|c| now_ms < c.expires_at_ms)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip(self), level = "trace")]
    async fn fetch(&self, key: &str) -> Result<Option<Versioned<SlotTable>>> {
        let now_ms = self.time.now_ms();
        let state = self.state.read().await;

        let Some(cell) = state.live(key, now_ms) else {
            return Ok(None);
        };

        let record = decode_record(key, &cell.bytes)?;
        Ok(Some(Versioned::new(record.nodes, Version::new(cell.cursor))))
    }

    #[instrument(skip(self, table), fields(slots = table.len()), level = "trace")]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Version>,
        table: &SlotTable,
        _new_version: Version,
        ttl_secs: u64,
    ) -> Result<bool> {
        let now_ms = self.time.now_ms();
        let mut state = self.state.write().await;

        let current = state.live(key, now_ms).map(|c| Version::new(c.cursor));
        if current != expected {
            debug!(?current, ?expected, "cas rejected");
            return Ok(false);
        }

        // Native cursor; the proposed token is not used
        let cursor = state.cursor + 1;
        let record = StoredRecord::new(table.clone(), Version::new(cursor), now_ms, ttl_secs);
        let bytes = encode_record(key, &record)?;

        state.cursor = cursor;
        state.cells.insert(
            key.to_string(),
            Cell {
                bytes,
                cursor,
                expires_at_ms: record.expires_at_ms,
            },
        );

        Ok(true)
    }

    #[instrument(skip(self), level = "trace")]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.cells.remove(key);
        Ok(())
    }
}
