//! Beacon Storage
//!
//! Store adapters for the Beacon node registry.
//!
//! # Overview
//!
//! A registry keeps one record per logical registry key and mutates it
//! only through compare-and-swap. This crate provides:
//! - [`StoreAdapter`]: the capability trait (fetch, compare-and-swap, delete)
//! - [`MemoryStore`]: in-memory store with backend-native CAS cursors
//! - [`ConditionalStore`]: conditional-update store keyed on update timestamps
//! - `FdbStore`: FoundationDB store (feature `fdb`)
//! - [`SimStore`]: fault-injecting wrapper for deterministic tests

pub mod codec;
pub mod conditional;
#[cfg(feature = "fdb")]
pub mod fdb;
pub mod memory;
pub mod sim;
pub mod store;

pub use codec::{decode_record, encode_record, StoredRecord};
pub use conditional::ConditionalStore;
#[cfg(feature = "fdb")]
pub use fdb::FdbStore;
pub use memory::MemoryStore;
pub use sim::{seed_from_env_or_random, FaultConfig, FaultType, SimStore};
pub use store::StoreAdapter;
