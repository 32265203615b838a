//! Record codec
//!
//! TigerStyle: One encoding for every backend, bounded size, validated on decode.
//!
//! The stored record is a JSON object:
//! ```text
//! {
//!   "version": 1704067200000,
//!   "updatedAtMs": 1704067200000,
//!   "expiresAtMs": 1706659200000,
//!   "nodes": { "0": {"nodeId": 1, "nodeUrl": "http://1", "lastHeartbeatAtMillis": ...} }
//! }
//! ```

use beacon_core::constants::RECORD_SIZE_BYTES_MAX;
use beacon_core::{Error, Result, SlotTable, Version, Versioned};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One registry record as stored by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// Version token of this write
    pub version: Version,
    /// Time of the write (milliseconds since epoch)
    pub updated_at_ms: u64,
    /// Safety expiry (milliseconds since epoch)
    pub expires_at_ms: u64,
    /// The slot table
    pub nodes: SlotTable,
}

impl StoredRecord {
    /// Create a record written at `now_ms` that lives for `ttl_secs`
    pub fn new(nodes: SlotTable, version: Version, now_ms: u64, ttl_secs: u64) -> Self {
        Self {
            version,
            updated_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(ttl_secs.saturating_mul(1000)),
            nodes,
        }
    }

    /// Check whether the safety TTL has elapsed
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Consume the record into its table and version
    pub fn into_versioned(self) -> Versioned<SlotTable> {
        Versioned::new(self.nodes, self.version)
    }
}

/// Encode a record for storage under `key`
pub fn encode_record(key: &str, record: &StoredRecord) -> Result<Bytes> {
    let bytes = serde_json::to_vec(record).map_err(|e| Error::SerializationFailed {
        reason: format!("{}: {}", key, e),
    })?;

    if bytes.len() > RECORD_SIZE_BYTES_MAX {
        return Err(Error::RecordTooLarge {
            size: bytes.len(),
            limit: RECORD_SIZE_BYTES_MAX,
        });
    }

    Ok(Bytes::from(bytes))
}

/// Decode a record read from `key`
///
/// Fails on malformed JSON and on slot tables that are not dense.
pub fn decode_record(key: &str, bytes: &[u8]) -> Result<StoredRecord> {
    if bytes.len() > RECORD_SIZE_BYTES_MAX {
        return Err(Error::RecordTooLarge {
            size: bytes.len(),
            limit: RECORD_SIZE_BYTES_MAX,
        });
    }

    serde_json::from_slice(bytes).map_err(|e| Error::DeserializationFailed {
        reason: format!("{}: {}", key, e),
    })
}
