//! FoundationDB store
//!
//! Linearizable registry storage for multi-process deployments.
//!
//! TigerStyle: One transaction per CAS, conflicts reported as "not applied".
//!
//! # Key Space Design
//!
//! ```text
//! ("beacon", "registry", key) -> encoded record
//! ```
//!
//! FoundationDB has no per-key TTL, so the safety expiry is stored inside
//! the record and enforced on read.

use crate::codec::{decode_record, encode_record, StoredRecord};
use crate::store::StoreAdapter;
use async_trait::async_trait;
use beacon_core::{Error, Result, SlotTable, TimeProvider, Version, Versioned, WallClockTime};
use foundationdb::api::{FdbApiBuilder, NetworkAutoStop};
use foundationdb::options::TransactionOption;
use foundationdb::tuple::Subspace;
use foundationdb::{Database, Transaction};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Global FDB network guard - must live for the entire process
static FDB_NETWORK: OnceLock<NetworkAutoStop> = OnceLock::new();

const KEY_PREFIX_BEACON: &str = "beacon";
const KEY_PREFIX_REGISTRY: &str = "registry";

/// Per-transaction timeout in milliseconds
const TRANSACTION_TIMEOUT_MS: i32 = 5_000;

/// FoundationDB-backed store
#[derive(Clone)]
pub struct FdbStore {
    db: Arc<Database>,
    subspace: Subspace,
    time: Arc<dyn TimeProvider>,
}

impl FdbStore {
    /// Connect to a FoundationDB cluster
    ///
    /// `cluster_file` of `None` uses the default cluster file location.
    ///
    /// # Errors
    /// Returns error if the network cannot be booted or the database opened.
    #[instrument(skip_all, fields(cluster_file))]
    pub async fn connect(cluster_file: Option<&str>) -> Result<Self> {
        if FDB_NETWORK.get().is_none() {
            let builder = FdbApiBuilder::default()
                .build()
                .map_err(|e| Error::internal(format!("FDB API build failed: {}", e)))?;
            // SAFETY: booted at most once per process; the guard is kept in
            // FDB_NETWORK for the process lifetime
            let guard = unsafe { builder.boot() }
                .map_err(|e| Error::internal(format!("FDB network boot failed: {}", e)))?;
            let _ = FDB_NETWORK.set(guard);
        }

        let db = Database::new(cluster_file)
            .map_err(|e| Error::internal(format!("FDB database open failed: {}", e)))?;

        debug!("Connected to FoundationDB");
        Ok(Self::from_database(Arc::new(db)))
    }

    /// Create a store from an existing database handle
    pub fn from_database(db: Arc<Database>) -> Self {
        Self {
            db,
            subspace: Subspace::from((KEY_PREFIX_BEACON, KEY_PREFIX_REGISTRY)),
            time: Arc::new(WallClockTime::new()),
        }
    }

    /// Replace the time provider used for TTL stamps
    pub fn with_time(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    fn encode_key(&self, key: &str) -> Vec<u8> {
        self.subspace.pack(&key)
    }

    fn create_trx(&self, key: &str) -> Result<Transaction> {
        let txn = self
            .db
            .create_trx()
            .map_err(|e| Error::storage_read_failed(key, format!("create transaction: {}", e)))?;
        txn.set_option(TransactionOption::Timeout(TRANSACTION_TIMEOUT_MS))
            .map_err(|e| Error::storage_read_failed(key, format!("set timeout: {}", e)))?;
        Ok(txn)
    }

    /// Read and decode the live record inside `txn`
    async fn read_live(&self, txn: &Transaction, key: &str) -> Result<Option<StoredRecord>> {
        let raw = txn
            .get(&self.encode_key(key), false)
            .await
            .map_err(|e| Error::storage_read_failed(key, format!("get: {}", e)))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let record = decode_record(key, raw.as_ref())?;
        if record.is_expired(self.time.now_ms()) {
            return Ok(None);
        }
        Ok(Some(record))
    }
}

impl std::fmt::Debug for FdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FdbStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreAdapter for FdbStore {
    fn name(&self) -> &'static str {
        "foundationdb"
    }

    #[instrument(skip(self), level = "trace")]
    async fn fetch(&self, key: &str) -> Result<Option<Versioned<SlotTable>>> {
        let txn = self.create_trx(key)?;
        let record = self.read_live(&txn, key).await?;
        Ok(record.map(StoredRecord::into_versioned))
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
        let txn = self.create_trx(key)?;

        // The read adds the key to the read conflict range, so a concurrent
        // commit to it fails ours
        let current = self.read_live(&txn, key).await?.map(|r| r.version);
        if current != expected {
            debug!(?current, ?expected, "cas rejected");
            return Ok(false);
        }

        let record = StoredRecord::new(table.clone(), new_version, self.time.now_ms(), ttl_secs);
        let bytes = encode_record(key, &record)?;
        txn.set(&self.encode_key(key), &bytes);

        match txn.commit().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_retryable() => {
                debug!(error = %e, "commit conflict, not applied");
                Ok(false)
            }
            Err(e) => Err(Error::storage_write_failed(key, format!("commit: {}", e))),
        }
    }

    #[instrument(skip(self), level = "trace")]
    async fn delete(&self, key: &str) -> Result<()> {
        let txn = self
            .create_trx(key)
            .map_err(|e| Error::storage_write_failed(key, e.to_string()))?;
        txn.clear(&self.encode_key(key));

        txn.commit().await.map_err(|e| {
            warn!(error = %e, "delete commit failed");
            Error::storage_write_failed(key, format!("commit: {}", e))
        })?;
        Ok(())
    }
}
