//! Beacon Core
//!
//! Core types, errors, and constants for the Beacon node registry.
//!
//! # Overview
//!
//! Beacon tracks which nodes of a service are alive. Nodes announce
//! themselves with periodic heartbeats into a slot-indexed table stored as a
//! single record in a replicated store; every mutation is a compare-and-swap
//! of the whole record. Stale nodes are evicted as a side effect of the next
//! heartbeat, and keys are routed to nodes by jump consistent hashing over
//! the dense slot indices.
//!
//! This crate holds the data model shared by the storage and registry
//! layers: [`Node`], [`SlotTable`], the OCC [`Version`] token, errors,
//! configuration and the time abstraction.
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `REGISTRY_SLOTS_COUNT_MAX`)
//! - Assertions on pre- and postconditions
//! - No recursion (bounded iteration only)

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod node;
pub mod occ;
pub mod slot;
pub mod telemetry;

pub use config::RegistryConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use io::{ManualClock, TimeProvider, WallClockTime};
pub use node::{Node, NodeEntry};
pub use occ::{Version, Versioned};
pub use slot::{NodeSnapshot, SlotTable};
pub use telemetry::{init_telemetry, TelemetryConfig};
