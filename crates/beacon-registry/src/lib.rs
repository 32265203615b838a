//! Beacon Registry
//!
//! Heartbeat-driven node discovery and key routing.
//!
//! # Overview
//!
//! The registry provides:
//! - [`NodeRegistry`]: slot-indexed node table with CAS-only mutation
//! - Heartbeat-based eviction of nodes that stopped announcing themselves
//! - [`HeartbeatPublisher`]: background task heartbeating one node
//! - [`ConsistentHashRouter`]: jump consistent hash over the slot table
//! - [`NodeListener`]: change notification after every committed mutation
//! - [`PeerSync`]: bulk reconciliation for view-driven membership
//!
//! # Example
//!
//! ```rust,ignore
//! use beacon_core::{Node, RegistryConfig, REGISTRY_KEY_CLIENT_NODES};
//! use beacon_registry::{ConsistentHashRouter, NodeRegistry};
//! use beacon_storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(NodeRegistry::new(
//!     Arc::new(MemoryStore::new()),
//!     REGISTRY_KEY_CLIENT_NODES,
//!     RegistryConfig::default(),
//! )?);
//! registry.heartbeat(&Node::new(1, "http://10.0.0.1:8080")?).await?;
//!
//! let router: ConsistentHashRouter<str> = ConsistentHashRouter::new(registry);
//! let owner = router.route_key("user:1234").await?;
//! ```

pub mod error;
pub mod hash;
pub mod heartbeat;
pub mod listener;
pub mod membership;
pub mod registry;
pub mod router;

pub use error::{RegistryError, RegistryResult};
pub use hash::{hash64, jump_consistent_hash};
pub use heartbeat::HeartbeatPublisher;
pub use listener::NodeListener;
pub use membership::{PeerSync, SyncReport};
pub use registry::NodeRegistry;
pub use router::{route_bucket, ConsistentHashRouter, RouteKey};
