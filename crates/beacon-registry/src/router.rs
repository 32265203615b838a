//! Consistent-hash router
//!
//! TigerStyle: The slot index is the bucket; no separate ring is maintained.
//!
//! A key is canonicalized to bytes, hashed to 64 bits, and jump-hashed over
//! the current table size. The resulting bucket indexes straight into the
//! dense slot table. This trades the rebalancing guarantees of a full hash
//! ring for simplicity; registries hold tens of nodes.
//!
//! Removing the node in the last slot remaps an expected `1/N` of keys.
//! Removing any other node also relocates the last node into the freed
//! slot, which roughly doubles that.

use crate::error::{RegistryError, RegistryResult};
use crate::hash::{hash64, jump_consistent_hash};
use crate::registry::NodeRegistry;
use beacon_core::constants::REGISTRY_SLOTS_COUNT_MAX;
use beacon_core::Node;
use std::borrow::Cow;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, trace};

/// A key that can be routed
///
/// Integers canonicalize to their decimal text, so `42u64` and `"42"` route
/// to the same node.
pub trait RouteKey {
    fn canonicalize(&self) -> Cow<'_, [u8]>;
}

impl RouteKey for str {
    fn canonicalize(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl RouteKey for String {
    fn canonicalize(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl RouteKey for [u8] {
    fn canonicalize(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl RouteKey for Vec<u8> {
    fn canonicalize(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_slice())
    }
}

impl<T: RouteKey + ?Sized> RouteKey for &T {
    fn canonicalize(&self) -> Cow<'_, [u8]> {
        (**self).canonicalize()
    }
}

macro_rules! impl_route_key_for_integer {
    ($($t:ty),*) => {
        $(
            impl RouteKey for $t {
                fn canonicalize(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_string().into_bytes())
                }
            }
        )*
    };
}

impl_route_key_for_integer!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// Bucket of `key` in a table of `size` slots
///
/// # Panics
/// Panics if `size == 0`.
pub fn route_bucket<K: RouteKey + ?Sized>(key: &K, size: usize) -> usize {
    assert!(size > 0, "cannot route over an empty table");
    debug_assert!(size <= REGISTRY_SLOTS_COUNT_MAX);

    let buckets = size.min(u32::MAX as usize) as u32;
    jump_consistent_hash(hash64(&key.canonicalize()), buckets) as usize
}

/// Routes keys to registered nodes
pub struct ConsistentHashRouter<K: ?Sized> {
    registry: Arc<NodeRegistry>,
    _key: PhantomData<fn(&K)>,
}

impl<K: ?Sized> Clone for ConsistentHashRouter<K> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            _key: PhantomData,
        }
    }
}

impl<K: ?Sized> std::fmt::Debug for ConsistentHashRouter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistentHashRouter")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<K: RouteKey + ?Sized> ConsistentHashRouter<K> {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            _key: PhantomData,
        }
    }

    /// Node responsible for `key` under the current stored table
    ///
    /// # Errors
    /// `EmptyRegistry` if no node is registered.
    pub async fn route_key(&self, key: &K) -> RegistryResult<Node> {
        let nodes = self.registry.get_nodes().await;
        if nodes.is_empty() {
            return Err(RegistryError::empty_registry(self.registry.key()));
        }

        let size = nodes.len();
        let slot = route_bucket(key, size);
        trace!(slot, size, "routed key");

        match nodes.get(&slot) {
            Some(node) => Ok(node.clone()),
            None => {
                // Unreachable while slots stay dense
                error!(slot, size, key = self.registry.key(), "routed to an empty slot");
                Err(RegistryError::NodeNotFound { slot, size })
            }
        }
    }

    /// Number of registered nodes
    pub async fn node_count(&self) -> usize {
        self.registry.size().await
    }

    /// Distinct registered nodes
    pub async fn current_nodes(&self) -> HashSet<Node> {
        self.registry.get_nodes().await.into_values().collect()
    }

    /// Heartbeat through the wrapped registry
    pub async fn heartbeat(&self, node: &Node) -> RegistryResult<()> {
        self.registry.heartbeat(node).await
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }
}
