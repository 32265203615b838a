//! Fault-injecting store wrapper
//!
//! TigerStyle: Explicit fault types, seeded probabilistic injection.
//!
//! `SimStore` wraps any adapter and, per operation, asks its injector whether
//! to fail the read, fail the write, report a lost CAS race, or delay. All
//! randomness comes from a seeded ChaCha20 generator so a failing run can be
//! replayed with the same seed.

use crate::store::StoreAdapter;
use async_trait::async_trait;
use beacon_core::{Error, Result, SlotTable, Version, Versioned};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Seed from `DST_SEED`, or a random one
///
/// The chosen seed is logged so a failing run can be replayed.
pub fn seed_from_env_or_random() -> u64 {
    let seed = std::env::var("DST_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(rand::random);

    tracing::info!(seed, "DST seed (set DST_SEED={} to replay)", seed);
    seed
}

/// Fault kinds a `SimStore` can inject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultType {
    /// `fetch` fails with a transient read error
    StoreReadFail,
    /// `compare_and_swap` or `delete` fails with a transient write error
    StoreWriteFail,
    /// `compare_and_swap` reports "not applied" without touching the store
    CasConflict,
    /// The operation is delayed before reaching the inner store
    StoreLatency { min_ms: u64, max_ms: u64 },
}

impl FaultType {
    pub fn name(&self) -> &'static str {
        match self {
            FaultType::StoreReadFail => "store_read_fail",
            FaultType::StoreWriteFail => "store_write_fail",
            FaultType::CasConflict => "cas_conflict",
            FaultType::StoreLatency { .. } => "store_latency",
        }
    }

    /// Whether this fault can apply to the given operation
    fn applies_to(&self, operation: Operation) -> bool {
        match self {
            FaultType::StoreReadFail => operation == Operation::Fetch,
            FaultType::StoreWriteFail => operation != Operation::Fetch,
            FaultType::CasConflict => operation == Operation::CompareAndSwap,
            FaultType::StoreLatency { .. } => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Fetch,
    CompareAndSwap,
    Delete,
}

/// Configuration of one injectable fault
#[derive(Debug, Clone)]
pub struct FaultConfig {
    pub fault_type: FaultType,
    /// Probability of triggering per eligible operation, in [0, 1]
    pub probability: f64,
    /// Only trigger once this many operations have been seen
    pub after_operations: u64,
    /// Stop triggering after this many injections
    pub max_triggers: Option<u64>,
}

impl FaultConfig {
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );

        Self {
            fault_type,
            probability,
            after_operations: 0,
            max_triggers: None,
        }
    }

    pub fn after(mut self, operations: u64) -> Self {
        self.after_operations = operations;
        self
    }

    pub fn max_triggers(mut self, max: u64) -> Self {
        self.max_triggers = Some(max);
        self
    }
}

#[derive(Debug)]
struct FaultState {
    config: FaultConfig,
    trigger_count: AtomicU64,
}

/// Store wrapper with seeded fault injection
#[derive(Debug)]
pub struct SimStore<S> {
    inner: S,
    faults: Vec<FaultState>,
    rng: Mutex<ChaCha20Rng>,
    seed: u64,
    operation_count: AtomicU64,
}

impl<S: StoreAdapter> SimStore<S> {
    /// Wrap `inner` with no faults registered
    pub fn new(inner: S, seed: u64) -> Self {
        Self {
            inner,
            faults: Vec::new(),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            seed,
            operation_count: AtomicU64::new(0),
        }
    }

    /// Register a fault
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.faults.push(FaultState {
            config,
            trigger_count: AtomicU64::new(0),
        });
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Operations seen so far
    pub fn operation_count(&self) -> u64 {
        self.operation_count.load(Ordering::SeqCst)
    }

    /// Times the given fault kind has been injected
    pub fn trigger_count(&self, fault_type: &FaultType) -> u64 {
        self.faults
            .iter()
            .filter(|f| f.config.fault_type.name() == fault_type.name())
            .map(|f| f.trigger_count.load(Ordering::SeqCst))
            .sum()
    }

    fn next_f64(&self) -> f64 {
        // A poisoned lock only means another task panicked mid-draw
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen()
    }

    fn next_range(&self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(min..max)
    }

    /// Decide which faults fire for this operation
    ///
    /// Latency is applied and does not end the search; the first failure
    /// fault found is returned.
    async fn inject(&self, operation: Operation, key: &str) -> Option<FaultType> {
        let op_count = self.operation_count.fetch_add(1, Ordering::SeqCst);

        for state in &self.faults {
            let config = &state.config;
            if !config.fault_type.applies_to(operation) || op_count < config.after_operations {
                continue;
            }

            let trigger_count = state.trigger_count.load(Ordering::SeqCst);
            if config.max_triggers.is_some_and(|max| trigger_count >= max) {
                continue;
            }

            if self.next_f64() >= config.probability {
                continue;
            }

            state.trigger_count.fetch_add(1, Ordering::SeqCst);
            debug!(
                fault = config.fault_type.name(),
                ?operation,
                key,
                trigger_count = trigger_count + 1,
                "Injecting fault"
            );

            match config.fault_type {
                FaultType::StoreLatency { min_ms, max_ms } => {
                    let delay_ms = self.next_range(min_ms, max_ms);
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                }
                ref fault => return Some(fault.clone()),
            }
        }

        None
    }
}

#[async_trait]
impl<S: StoreAdapter> StoreAdapter for SimStore<S> {
    fn name(&self) -> &'static str {
        "sim"
    }

    async fn fetch(&self, key: &str) -> Result<Option<Versioned<SlotTable>>> {
        if let Some(fault) = self.inject(Operation::Fetch, key).await {
            return Err(Error::storage_read_failed(key, fault.name()));
        }
        self.inner.fetch(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Version>,
        table: &SlotTable,
        new_version: Version,
        ttl_secs: u64,
    ) -> Result<bool> {
        match self.inject(Operation::CompareAndSwap, key).await {
            Some(FaultType::CasConflict) => Ok(false),
            Some(fault) => Err(Error::storage_write_failed(key, fault.name())),
            None => {
                self.inner
                    .compare_and_swap(key, expected, table, new_version, ttl_secs)
                    .await
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if let Some(fault) = self.inject(Operation::Delete, key).await {
            return Err(Error::storage_write_failed(key, fault.name()));
        }
        self.inner.delete(key).await
    }

    fn supports_remove(&self) -> bool {
        self.inner.supports_remove()
    }
}
