//! Node registry
//!
//! TigerStyle: Every mutation is one compare-and-swap of the whole record.
//!
//! # Protocol
//!
//! ```text
//! loop (bounded by cas_attempts_max and cas_deadline_ms):
//!     fetch record            -> (table, version) | absent
//!     transform(copy of table) (pure)
//!     compare_and_swap(expected = version | absent)
//!     applied?  -> swap local cache, notify listener, return
//!     conflict? -> retry from fetch
//! ```
//!
//! No client-side lock is taken: the store's CAS is the only serialization
//! between writers, in this process or any other. When the record is absent
//! the first attempt is an insert-if-absent; losing it to a concurrent first
//! writer simply falls through to the regular loop.
//!
//! Expired entries are evicted only by `heartbeat`, as part of its
//! transform. Reads never mutate.

use crate::error::{RegistryError, RegistryResult};
use crate::listener::{self, NodeListener};
use beacon_core::constants::REGISTRY_KEY_LENGTH_BYTES_MAX;
use beacon_core::{
    Error as CoreError, Node, NodeSnapshot, RegistryConfig, Result as CoreResult,
    SlotTable, TimeProvider, Version, Versioned, WallClockTime,
};
use beacon_storage::StoreAdapter;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, instrument, warn};

/// Slot-indexed registry of live nodes under one store key
pub struct NodeRegistry {
    store: Arc<dyn StoreAdapter>,
    key: String,
    config: RegistryConfig,
    time: Arc<dyn TimeProvider>,
    /// Snapshot of the last table this instance committed
    cache: RwLock<NodeSnapshot>,
    listener: RwLock<Option<Arc<dyn NodeListener>>>,
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("store", &self.store.name())
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NodeRegistry {
    /// Create a registry using wall clock time
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` for an empty or oversized key or an
    /// invalid config.
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        key: impl Into<String>,
        config: RegistryConfig,
    ) -> RegistryResult<Self> {
        Self::with_time(store, key, config, Arc::new(WallClockTime::new()))
    }

    /// Create a registry with injected time
    pub fn with_time(
        store: Arc<dyn StoreAdapter>,
        key: impl Into<String>,
        config: RegistryConfig,
        time: Arc<dyn TimeProvider>,
    ) -> RegistryResult<Self> {
        let key = key.into();
        validate_key(&key).map_err(|e| RegistryError::from_store("new", &key, e))?;
        config
            .validate()
            .map_err(|e| RegistryError::from_store("new", &key, e))?;

        Ok(Self {
            store,
            key,
            config,
            time,
            cache: RwLock::new(NodeSnapshot::new()),
            listener: RwLock::new(None),
        })
    }

    /// Store key of this registry
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Backend name of the underlying store
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current slot table as stored
    ///
    /// Never fails: an absent record, an unreachable store and an
    /// undecodable record all yield the empty mapping.
    #[instrument(skip(self), fields(key = %self.key), level = "debug")]
    pub async fn get_nodes(&self) -> NodeSnapshot {
        match self.store.fetch(&self.key).await {
            Ok(Some(record)) => record.value.to_snapshot(),
            Ok(None) => NodeSnapshot::new(),
            Err(e) => {
                warn!(error = %e, "failed to read nodes, returning empty");
                NodeSnapshot::new()
            }
        }
    }

    /// Number of nodes in the stored table
    pub async fn size(&self) -> usize {
        self.get_nodes().await.len()
    }

    /// Snapshot of the last table this instance committed
    ///
    /// No store round trip. May be stale relative to writes by other
    /// instances. Under concurrent mutations through this same instance the
    /// cache may also briefly hold an older table than the last commit, since
    /// commits and cache swaps are not ordered together.
    pub fn cached_nodes(&self) -> NodeSnapshot {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Announce `node` as alive
    ///
    /// Evicts every entry that has missed its heartbeats, then refreshes
    /// `node`'s timestamp or appends it at the end of the table.
    #[instrument(skip(self, node), fields(key = %self.key, node = %node))]
    pub async fn heartbeat(&self, node: &Node) -> RegistryResult<()> {
        let threshold_ms = self.config.expiry_threshold_ms();

        let (slot, evicted) = self
            .mutate("heartbeat", |table, now_ms| {
                let evicted = table.sweep_expired(now_ms, threshold_ms);
                let slot = table.touch(node.clone(), now_ms)?;
                Ok((slot, evicted))
            })
            .await?;

        for entry in &evicted {
            debug!(
                evicted = %entry.node,
                last_heartbeat_at_ms = entry.last_heartbeat_at_ms,
                "evicted expired node"
            );
        }
        debug!(slot, evicted_count = evicted.len(), "heartbeat committed");
        Ok(())
    }

    /// Insert or refresh `node` without the expiration sweep
    #[instrument(skip(self, node), fields(key = %self.key, node = %node))]
    pub async fn add(&self, node: &Node) -> RegistryResult<()> {
        let slot = self
            .mutate("add", |table, now_ms| table.touch(node.clone(), now_ms))
            .await?;

        debug!(slot, "add committed");
        Ok(())
    }

    /// Swap-remove `node`; a no-op if it is not registered
    ///
    /// # Errors
    /// Returns `UnsupportedOperation` immediately on stores that forbid
    /// single-node removal.
    #[instrument(skip(self, node), fields(key = %self.key, node = %node))]
    pub async fn remove(&self, node: &Node) -> RegistryResult<()> {
        if !self.store.supports_remove() {
            return Err(RegistryError::from_store(
                "remove",
                &self.key,
                CoreError::unsupported("remove", self.store.name()),
            ));
        }

        let removed_slot = self
            .mutate("remove", |table, _now_ms| Ok(table.remove_node(node)))
            .await?;

        debug!(?removed_slot, "remove committed");
        Ok(())
    }

    /// Delete the whole record and reset the local cache
    ///
    /// Not coordinated with concurrent writers: a heartbeat racing this
    /// call may recreate the record. The listener is not notified.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn remove_all(&self) -> RegistryResult<()> {
        self.store
            .delete(&self.key)
            .await
            .map_err(|e| RegistryError::from_store("remove_all", &self.key, e))?;

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = NodeSnapshot::new();
        debug!("registry cleared");
        Ok(())
    }

    // =========================================================================
    // Listener
    // =========================================================================

    /// Register the change listener, replacing any previous one
    ///
    /// Called exactly once per committed mutation. When several mutations
    /// run concurrently on this instance, calls may arrive out of commit
    /// order, so `old -> new` pairs do not necessarily chain.
    pub fn set_listener<L>(&self, listener: L)
    where
        L: NodeListener + 'static,
    {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    /// Remove the change listener
    pub fn clear_listener(&self) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    // =========================================================================
    // CAS loop
    // =========================================================================

    /// Run `transform` against the stored table until one CAS applies
    ///
    /// `transform` receives a fresh copy of the fetched table on every
    /// attempt and must not have side effects. Returns the transform's
    /// output from the attempt that committed.
    pub(crate) async fn mutate<T, F>(&self, operation: &'static str, transform: F) -> RegistryResult<T>
    where
        F: Fn(&mut SlotTable, u64) -> CoreResult<T> + Send + Sync,
        T: Send,
    {
        let attempts_max = self.config.cas_attempts_max;
        let started_ms = self.time.monotonic_ms();
        let mut attempts: u32 = 0;
        let mut last_error: Option<CoreError> = None;

        debug_assert!(attempts_max >= 1);

        loop {
            let elapsed_ms = self.time.monotonic_ms().saturating_sub(started_ms);
            if attempts >= attempts_max || (attempts > 0 && elapsed_ms >= self.config.cas_deadline_ms)
            {
                return Err(self.exhausted(operation, attempts, elapsed_ms, last_error));
            }
            attempts += 1;

            let current = match self.store.fetch(&self.key).await {
                Ok(current) => current,
                Err(e) if e.is_retriable() => {
                    warn!(
                        operation,
                        attempt = attempts,
                        error = %e,
                        "fetch failed (attempt {}/{}), retrying",
                        attempts,
                        attempts_max
                    );
                    last_error = Some(e);
                    tokio::task::yield_now().await;
                    continue;
                }
                Err(e) => return Err(RegistryError::from_store(operation, &self.key, e)),
            };

            let (expected, mut table) = match current {
                Some(Versioned { value, version }) => (Some(version), value),
                None => (None, SlotTable::new()),
            };

            let now_ms = self.time.now_ms();
            let output = transform(&mut table, now_ms)
                .map_err(|e| RegistryError::from_store(operation, &self.key, e))?;
            let new_version = Version::next_after(expected, now_ms);

            let applied = match self
                .store
                .compare_and_swap(
                    &self.key,
                    expected,
                    &table,
                    new_version,
                    self.config.record_ttl_secs,
                )
                .await
            {
                Ok(applied) => applied,
                Err(e) if e.is_retriable() => {
                    warn!(
                        operation,
                        attempt = attempts,
                        error = %e,
                        "write failed (attempt {}/{}), retrying",
                        attempts,
                        attempts_max
                    );
                    last_error = Some(e);
                    tokio::task::yield_now().await;
                    continue;
                }
                Err(e) => return Err(RegistryError::from_store(operation, &self.key, e)),
            };

            if applied {
                self.commit_local(table.to_snapshot());
                return Ok(output);
            }

            last_error = None;
            if expected.is_none() {
                debug!(operation, "insert-if-absent lost to a concurrent writer, retrying");
            } else {
                warn!(
                    operation,
                    attempt = attempts,
                    "CAS conflict (attempt {}/{}), retrying",
                    attempts,
                    attempts_max
                );
            }
            tokio::task::yield_now().await;
        }
    }

    fn exhausted(
        &self,
        operation: &'static str,
        attempts: u32,
        elapsed_ms: u64,
        last_error: Option<CoreError>,
    ) -> RegistryError {
        match last_error {
            // The final attempt failed on the store, not on a lost race
            Some(e) => {
                error!(operation, attempts, error = %e, "store unavailable, giving up");
                RegistryError::from_store(operation, &self.key, e)
            }
            None => {
                error!(operation, attempts, elapsed_ms, "retry budget exhausted");
                RegistryError::RetryBudgetExhausted {
                    key: self.key.clone(),
                    attempts,
                    elapsed_ms,
                }
            }
        }
    }

    /// Swap the cache to `new` and notify the listener outside any lock
    fn commit_local(&self, new: NodeSnapshot) {
        let old = {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *cache, new.clone())
        };

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener::notify(listener.as_ref(), &self.key, &old, &new);
        }
    }
}

fn validate_key(key: &str) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty".into(),
        });
    }
    if key.len() > REGISTRY_KEY_LENGTH_BYTES_MAX {
        return Err(CoreError::InvalidKey {
            key: key.chars().take(32).collect(),
            reason: format!(
                "key length {} exceeds limit {}",
                key.len(),
                REGISTRY_KEY_LENGTH_BYTES_MAX
            ),
        });
    }
    Ok(())
}
