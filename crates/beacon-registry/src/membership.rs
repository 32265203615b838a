//! Bulk membership contract
//!
//! TigerStyle: Reconciliation as a single CAS transform.
//!
//! Peer-discovery services that observe membership directly (view changes
//! from a group communication layer, for example) feed the registry through
//! this trait instead of heartbeats. Such callers serialize reconciliations
//! among themselves; the registry adds no locking beyond its CAS.

use crate::error::RegistryResult;
use crate::registry::NodeRegistry;
use async_trait::async_trait;
use beacon_core::{Node, NodeSnapshot, SlotTable};
use std::collections::HashSet;
use tracing::{info, instrument};

/// Outcome of a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Nodes appended because they were newly observed
    pub added: Vec<Node>,
    /// Nodes swap-removed because they vanished from the view
    pub removed: Vec<Node>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Bulk sync/replace entry points
#[async_trait]
pub trait PeerSync: Send + Sync {
    /// Reconcile the table to `actual`
    ///
    /// Vanished nodes are swap-removed and newly seen ones appended.
    /// `self_node` is always kept. No expiration sweep runs.
    async fn sync(&self, actual: &HashSet<Node>, self_node: &Node) -> RegistryResult<SyncReport>;

    /// Current table, for handing to a joining process
    async fn snapshot(&self) -> NodeSnapshot;

    /// Replace the table with `nodes`, in order, deduplicated
    async fn set_nodes(&self, nodes: Vec<Node>) -> RegistryResult<()>;
}

#[async_trait]
impl PeerSync for NodeRegistry {
    #[instrument(skip(self, actual, self_node), fields(key = %self.key(), peers = actual.len()))]
    async fn sync(&self, actual: &HashSet<Node>, self_node: &Node) -> RegistryResult<SyncReport> {
        let report = self
            .mutate("sync", |table: &mut SlotTable, now_ms| {
                let mut report = SyncReport::default();

                let vanished: Vec<Node> = table
                    .nodes()
                    .filter(|n| *n != self_node && !actual.contains(*n))
                    .cloned()
                    .collect();
                for node in vanished {
                    table.remove_node(&node);
                    report.removed.push(node);
                }

                // HashSet order is arbitrary; append in a stable order
                let mut seen: Vec<&Node> = actual
                    .iter()
                    .chain(std::iter::once(self_node))
                    .filter(|n| !table.contains(n))
                    .collect();
                seen.sort();
                seen.dedup();
                for node in seen {
                    table.touch(node.clone(), now_ms)?;
                    report.added.push(node.clone());
                }

                Ok(report)
            })
            .await?;

        if !report.is_empty() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                "membership reconciled"
            );
        }
        Ok(report)
    }

    async fn snapshot(&self) -> NodeSnapshot {
        self.get_nodes().await
    }

    #[instrument(skip(self, nodes), fields(key = %self.key(), count = nodes.len()))]
    async fn set_nodes(&self, nodes: Vec<Node>) -> RegistryResult<()> {
        self.mutate("set_nodes", |table: &mut SlotTable, now_ms| {
            *table = SlotTable::from_nodes(nodes.iter().cloned(), now_ms)?;
            Ok(())
        })
        .await?;

        info!("membership replaced");
        Ok(())
    }
}
