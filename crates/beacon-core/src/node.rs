//! Node identity and slot entries
//!
//! TigerStyle: Value identity, validated at construction.

use crate::constants::NODE_URL_LENGTH_BYTES_MAX;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered node
///
/// Identity is the pair `(id, url)`: two nodes are equal iff both match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    /// Numeric node identifier
    #[serde(rename = "nodeId")]
    pub id: i64,
    /// Address the node is reachable at
    #[serde(rename = "nodeUrl")]
    pub url: String,
}

impl Node {
    /// Create a new node with validation
    ///
    /// # Errors
    /// Returns error if the URL is empty or too long.
    pub fn new(id: i64, url: impl Into<String>) -> Result<Self> {
        let url = url.into();

        if url.is_empty() {
            return Err(Error::InvalidNode {
                node: format!("{}@", id),
                reason: "url cannot be empty".into(),
            });
        }

        if url.len() > NODE_URL_LENGTH_BYTES_MAX {
            return Err(Error::InvalidNode {
                node: id.to_string(),
                reason: format!(
                    "url length {} exceeds limit {}",
                    url.len(),
                    NODE_URL_LENGTH_BYTES_MAX
                ),
            });
        }

        Ok(Self { id, url })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.url)
    }
}

/// One occupied slot: a node and the time it last announced itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    #[serde(flatten)]
    pub node: Node,
    /// Last heartbeat (milliseconds since epoch)
    #[serde(rename = "lastHeartbeatAtMillis")]
    pub last_heartbeat_at_ms: u64,
}

impl NodeEntry {
    pub fn new(node: Node, now_ms: u64) -> Self {
        Self {
            node,
            last_heartbeat_at_ms: now_ms,
        }
    }

    /// Check whether this entry has missed its heartbeats
    ///
    /// Expired iff strictly older than `threshold_ms`. A timestamp ahead of
    /// `now_ms` (clock skew between writers) counts as fresh.
    pub fn is_expired(&self, now_ms: u64, threshold_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_at_ms) > threshold_ms
    }
}
