//! Dense slot table
//!
//! TigerStyle: The density invariant is structural, not checked after the fact.
//!
//! Slots are the indices of a `Vec`, so they are always exactly
//! `0..len` with no gaps. Removal is a swap-remove: the last entry moves
//! into the freed slot and the table shrinks by one. The router indexes
//! straight into this table with a bucket in `0..len`, which is why gaps are never
//! allowed, not even transiently during an expiration sweep.

use crate::constants::REGISTRY_SLOTS_COUNT_MAX;
use crate::error::{Error, Result};
use crate::node::{Node, NodeEntry};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Read-only view of a slot table: slot index to node
pub type NodeSnapshot = BTreeMap<usize, Node>;

/// Slot-indexed node table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTable {
    entries: Vec<NodeEntry>,
}

impl SlotTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a node list, one slot per distinct node
    ///
    /// Duplicates keep their first position. Every entry is stamped `now_ms`.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>, now_ms: u64) -> Result<Self> {
        let mut table = Self::new();
        for node in nodes {
            table.touch(node, now_ms)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `slot`, if occupied
    pub fn get(&self, slot: usize) -> Option<&NodeEntry> {
        self.entries.get(slot)
    }

    /// Slot currently held by `node` (linear scan)
    pub fn position(&self, node: &Node) -> Option<usize> {
        self.entries.iter().position(|e| &e.node == node)
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.position(node).is_some()
    }

    /// Iterate `(slot, entry)` in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &NodeEntry)> {
        self.entries.iter().enumerate()
    }

    /// Iterate nodes in slot order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|e| &e.node)
    }

    /// Refresh `node`'s timestamp, or append it at slot `len()` if absent
    ///
    /// Returns the node's slot.
    pub fn touch(&mut self, node: Node, now_ms: u64) -> Result<usize> {
        if let Some(slot) = self.position(&node) {
            self.entries[slot].last_heartbeat_at_ms = now_ms;
            return Ok(slot);
        }

        if self.entries.len() >= REGISTRY_SLOTS_COUNT_MAX {
            return Err(Error::SlotTableFull {
                count: self.entries.len(),
                limit: REGISTRY_SLOTS_COUNT_MAX,
            });
        }

        let slot = self.entries.len();
        self.entries.push(NodeEntry::new(node, now_ms));

        debug_assert_eq!(self.position(&self.entries[slot].node), Some(slot));
        Ok(slot)
    }

    /// Swap-remove the entry at `slot`
    ///
    /// The last entry moves into `slot`; every other slot is unchanged.
    ///
    /// # Panics
    /// Panics if `slot >= len()`.
    pub fn swap_remove(&mut self, slot: usize) -> NodeEntry {
        assert!(slot < self.entries.len(), "slot {} out of range", slot);
        self.entries.swap_remove(slot)
    }

    /// Swap-remove `node` if present, returning the slot it held
    pub fn remove_node(&mut self, node: &Node) -> Option<usize> {
        let slot = self.position(node)?;
        self.swap_remove(slot);
        Some(slot)
    }

    /// Evict every entry older than `threshold_ms`
    ///
    /// Each eviction is a swap-remove applied immediately. The index is not
    /// advanced after a removal because the entry moved into the freed slot
    /// has not been inspected yet.
    pub fn sweep_expired(&mut self, now_ms: u64, threshold_ms: u64) -> Vec<NodeEntry> {
        let mut evicted = Vec::new();
        let mut slot = 0;
        while slot < self.entries.len() {
            if self.entries[slot].is_expired(now_ms, threshold_ms) {
                evicted.push(self.entries.swap_remove(slot));
            } else {
                slot += 1;
            }
        }

        debug_assert!(self
            .entries
            .iter()
            .all(|e| !e.is_expired(now_ms, threshold_ms)));
        evicted
    }

    /// Slot-to-node view of the table
    pub fn to_snapshot(&self) -> NodeSnapshot {
        self.iter().map(|(slot, e)| (slot, e.node.clone())).collect()
    }
}

impl Serialize for SlotTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (slot, entry) in self.iter() {
            map.serialize_entry(&slot, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SlotTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let slots: BTreeMap<usize, NodeEntry> = BTreeMap::deserialize(deserializer)?;

        if slots.len() > REGISTRY_SLOTS_COUNT_MAX {
            return Err(de::Error::custom(format!(
                "{} slots exceeds limit {}",
                slots.len(),
                REGISTRY_SLOTS_COUNT_MAX
            )));
        }

        // BTreeMap keys are sorted and unique, so dense iff the last key is len - 1
        if let Some((&last, _)) = slots.iter().next_back() {
            if last != slots.len() - 1 {
                return Err(de::Error::custom(format!(
                    "slot indices not dense: {} slots, highest index {}",
                    slots.len(),
                    last
                )));
            }
        }

        let mut seen = HashSet::with_capacity(slots.len());
        let mut entries = Vec::with_capacity(slots.len());
        for (slot, entry) in slots {
            if !seen.insert(entry.node.clone()) {
                return Err(de::Error::custom(format!(
                    "node {} occupies more than one slot (again at {})",
                    entry.node, slot
                )));
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }
}
