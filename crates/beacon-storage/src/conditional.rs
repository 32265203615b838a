//! Conditional-update store
//!
//! TigerStyle: Compare on the caller's token, insert-if-not-exists on first write.
//!
//! Models a wide-column store with lightweight transactions:
//! ```text
//! INSERT INTO registry (key, nodes, updated) VALUES (?, ?, ?) IF NOT EXISTS USING TTL ?
//! UPDATE registry USING TTL ? SET nodes = ?, updated = ? WHERE key = ? IF updated = ?
//! ```
//! The version token is the caller's proposed update timestamp. Deployments
//! on this kind of store forbid removing a single node, so
//! `supports_remove()` is false; deleting the whole record is allowed.

use crate::codec::{decode_record, encode_record, StoredRecord};
use crate::store::StoreAdapter;
use async_trait::async_trait;
use beacon_core::{Result, SlotTable, TimeProvider, Version, Versioned, WallClockTime};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Store row: encoded record, its `updated` column, and TTL deadline
#[derive(Debug, Clone)]
struct Row {
    bytes: Bytes,
    updated: Version,
    expires_at_ms: u64,
}

/// Conditional-update store keyed on caller-supplied timestamps
#[derive(Debug, Clone)]
pub struct ConditionalStore {
    rows: Arc<RwLock<HashMap<String, Row>>>,
    time: Arc<dyn TimeProvider>,
}

impl ConditionalStore {
    /// Create a new conditional store using wall clock time
    pub fn new() -> Self {
        Self::with_time(Arc::new(WallClockTime::new()))
    }

    /// Create a new conditional store with injected time
    pub fn with_time(time: Arc<dyn TimeProvider>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            time,
        }
    }
}

impl Default for ConditionalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreAdapter for ConditionalStore {
    fn name(&self) -> &'static str {
        "conditional"
    }

    #[instrument(skip(self), level = "trace")]
    async fn fetch(&self, key: &str) -> Result<Option<Versioned<SlotTable>>> {
        let now_ms = self.time.now_ms();
        let rows = self.rows.read().await;

        match rows.get(key).filter(|r| now_ms < r.expires_at_ms) {
            Some(row) => {
                let record = decode_record(key, &row.bytes)?;
                debug_assert_eq!(record.version, row.updated);
                Ok(Some(Versioned::new(record.nodes, row.updated)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, table), fields(slots = table.len()), level = "trace")]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Version>,
        table: &SlotTable,
        new_version: Version,
        ttl_secs: u64,
    ) -> Result<bool> {
        let now_ms = self.time.now_ms();
        let mut rows = self.rows.write().await;

        let current = rows
            .get(key)
            .filter(|r| now_ms < r.expires_at_ms)
            .map(|r| r.updated);

        let applied = match (expected, current) {
            // IF NOT EXISTS
            (None, None) => true,
            // IF updated = ?
            (Some(expected), Some(current)) => expected == current,
            _ => false,
        };

        if !applied {
            debug!(?current, ?expected, "conditional update not applied");
            return Ok(false);
        }

        let record = StoredRecord::new(table.clone(), new_version, now_ms, ttl_secs);
        let bytes = encode_record(key, &record)?;
        rows.insert(
            key.to_string(),
            Row {
                bytes,
                updated: new_version,
                expires_at_ms: record.expires_at_ms,
            },
        );

        Ok(true)
    }

    #[instrument(skip(self), level = "trace")]
    async fn delete(&self, key: &str) -> Result<()> {
        self.rows.write().await.remove(key);
        Ok(())
    }

    fn supports_remove(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{Node, REGISTRY_KEY_EVENT_NODES};

    const KEY: &str = REGISTRY_KEY_EVENT_NODES;

    fn table(id: i64) -> SlotTable {
        SlotTable::from_nodes([Node::new(id, format!("http://{}", id)).unwrap()], 0).unwrap()
    }

    #[tokio::test]
    async fn test_uses_caller_token() {
        let store = ConditionalStore::new();

        assert!(store
            .compare_and_swap(KEY, None, &table(1), Version::new(1_000), 60)
            .await
            .unwrap());

        let stored = store.fetch(KEY).await.unwrap().unwrap();
        assert_eq!(stored.version, Version::new(1_000));
    }

    #[tokio::test]
    async fn test_update_if_token_matches() {
        let store = ConditionalStore::new();
        store
            .compare_and_swap(KEY, None, &table(1), Version::new(1_000), 60)
            .await
            .unwrap();

        assert!(!store
            .compare_and_swap(KEY, Some(Version::new(999)), &table(2), Version::new(2_000), 60)
            .await
            .unwrap());
        assert!(store
            .compare_and_swap(KEY, Some(Version::new(1_000)), &table(2), Version::new(2_000), 60)
            .await
            .unwrap());

        let stored = store.fetch(KEY).await.unwrap().unwrap();
        assert_eq!(stored.value, table(2));
        assert_eq!(stored.version, Version::new(2_000));
    }

    #[tokio::test]
    async fn test_update_on_absent_row_fails() {
        let store = ConditionalStore::new();
        assert!(!store
            .compare_and_swap(KEY, Some(Version::new(1)), &table(1), Version::new(2), 60)
            .await
            .unwrap());
        assert!(store.fetch(KEY).await.unwrap().is_none());
    }

    #[test]
    fn test_forbids_single_node_remove() {
        assert!(!ConditionalStore::new().supports_remove());
    }
}
