//! DST tests for the node registry
//!
//! TigerStyle: Deterministic time, seeded faults, invariants checked against
//! the store rather than any single instance's cache.
//!
//! Invariants exercised:
//! - Slots are always dense `0..n` with no node in two slots
//! - Concurrent heartbeats of distinct nodes all land
//! - Expired nodes are evicted only by a later heartbeat
//! - Faults never corrupt the stored table

use beacon_core::{ManualClock, Node, NodeSnapshot, RegistryConfig, REGISTRY_KEY_CLIENT_NODES};
use beacon_registry::{NodeRegistry, RegistryError, RegistryResult};
use beacon_storage::{
    seed_from_env_or_random, FaultConfig, FaultType, MemoryStore, SimStore, StoreAdapter,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const KEY: &str = REGISTRY_KEY_CLIENT_NODES;

// =============================================================================
// Test Helpers
// =============================================================================

fn node(id: i64) -> Node {
    Node::new(id, format!("http://10.0.0.{}:8080", id)).unwrap()
}

fn registry(store: Arc<dyn StoreAdapter>, clock: &ManualClock, config: RegistryConfig) -> NodeRegistry {
    NodeRegistry::with_time(store, KEY, config, Arc::new(clock.clone())).unwrap()
}

/// Heartbeat until committed; contention and injected faults are retried
async fn heartbeat_until_committed(registry: &NodeRegistry, node: &Node) -> RegistryResult<u32> {
    let mut rounds = 0;
    loop {
        rounds += 1;
        match registry.heartbeat(node).await {
            Ok(()) => return Ok(rounds),
            Err(e) if e.is_retriable() && rounds < 100 => {
                tokio::task::yield_now().await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn assert_dense(snapshot: &NodeSnapshot) {
    for (expected, slot) in snapshot.keys().enumerate() {
        assert_eq!(*slot, expected, "slot gap in {:?}", snapshot);
    }
    let distinct: HashSet<&Node> = snapshot.values().collect();
    assert_eq!(distinct.len(), snapshot.len(), "duplicate node in {:?}", snapshot);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dst_concurrent_heartbeats_all_land() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));

    // One registry instance per task, as if each were its own process
    let mut handles = Vec::new();
    for id in 0..32 {
        let registry = registry(store.clone(), &clock, RegistryConfig::default());
        handles.push(tokio::spawn(async move {
            heartbeat_until_committed(&registry, &node(id)).await
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let observer = registry(store, &clock, RegistryConfig::default());
    let nodes = observer.get_nodes().await;
    assert_eq!(nodes.len(), 32);
    assert_dense(&nodes);

    let ids: HashSet<i64> = nodes.values().map(|n| n.id).collect();
    assert_eq!(ids, (0..32).collect::<HashSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dst_concurrent_first_insert() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));

    let first = registry(store.clone(), &clock, RegistryConfig::default());
    let second = registry(store.clone(), &clock, RegistryConfig::default());

    let node1 = node(1);
    let node2 = node(2);
    let (a, b) = tokio::join!(
        heartbeat_until_committed(&first, &node1),
        heartbeat_until_committed(&second, &node2),
    );
    a.unwrap();
    b.unwrap();

    let nodes = first.get_nodes().await;
    assert_eq!(nodes.len(), 2);
    assert_dense(&nodes);
}

#[tokio::test]
async fn test_dst_budget_exhaustion_is_reported() {
    let clock = ManualClock::default();
    let store = SimStore::new(MemoryStore::with_time(Arc::new(clock.clone())), 5)
        .with_fault(FaultConfig::new(FaultType::CasConflict, 1.0));
    let config = RegistryConfig::default().with_cas_attempts_max(3);
    let registry = registry(Arc::new(store), &clock, config);

    match registry.heartbeat(&node(1)).await.unwrap_err() {
        RegistryError::RetryBudgetExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(registry.get_nodes().await.is_empty());
}

#[tokio::test]
async fn test_dst_cas_deadline_caps_slow_retries() {
    // Every round trip takes ~20ms of real time and every CAS loses, so the
    // 100ms cap ends the loop long before the attempt budget does
    let store = SimStore::new(MemoryStore::new(), seed_from_env_or_random())
        .with_fault(FaultConfig::new(
            FaultType::StoreLatency {
                min_ms: 20,
                max_ms: 21,
            },
            1.0,
        ))
        .with_fault(FaultConfig::new(FaultType::CasConflict, 1.0));
    let store = Arc::new(store);
    let config = RegistryConfig::default()
        .with_cas_attempts_max(64)
        .with_cas_deadline_ms(100);
    let registry = NodeRegistry::new(store.clone(), KEY, config).unwrap();

    match registry.heartbeat(&node(1)).await.unwrap_err() {
        RegistryError::RetryBudgetExhausted {
            attempts,
            elapsed_ms,
            ..
        } => {
            assert!(elapsed_ms >= 100, "elapsed {}ms", elapsed_ms);
            assert!((1..64).contains(&attempts), "attempts {}", attempts);
        }
        other => panic!("unexpected: {:?}", other),
    }

    let latency = FaultType::StoreLatency {
        min_ms: 20,
        max_ms: 21,
    };
    assert!(store.trigger_count(&latency) >= 2);
    assert!(registry.cached_nodes().is_empty());
}

// =============================================================================
// Expiration and Notification
// =============================================================================

#[tokio::test]
async fn test_dst_expiry_and_listener_sequence() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    let config = RegistryConfig::default().with_heartbeat_delay_secs(2);
    let registry = registry(store, &clock, config);

    let calls: Arc<Mutex<Vec<(NodeSnapshot, NodeSnapshot)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    registry.set_listener(move |old: &NodeSnapshot, new: &NodeSnapshot| -> anyhow::Result<()> {
        sink.lock().unwrap().push((old.clone(), new.clone()));
        Ok(())
    });

    let a = node(1);
    let b = node(2);

    registry.heartbeat(&a).await.unwrap();
    registry.heartbeat(&a).await.unwrap();

    // Past the 4s threshold: reads still see A, nothing has swept yet
    clock.advance_ms(4_100);
    assert_eq!(registry.get_nodes().await, NodeSnapshot::from([(0, a.clone())]));

    registry.heartbeat(&b).await.unwrap();
    assert_eq!(registry.get_nodes().await, NodeSnapshot::from([(0, b.clone())]));

    let only_a = NodeSnapshot::from([(0, a)]);
    let only_b = NodeSnapshot::from([(0, b)]);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            (NodeSnapshot::new(), only_a.clone()),
            (only_a.clone(), only_a.clone()),
            (only_a, only_b),
        ]
    );
}

#[tokio::test]
async fn test_dst_node_at_threshold_survives() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    let config = RegistryConfig::default().with_heartbeat_delay_secs(2);
    let registry = registry(store, &clock, config);

    registry.heartbeat(&node(1)).await.unwrap();
    clock.advance_ms(4_000);
    registry.heartbeat(&node(2)).await.unwrap();

    assert_eq!(
        registry.get_nodes().await,
        NodeSnapshot::from([(0, node(1)), (1, node(2))])
    );
}

#[tokio::test]
async fn test_dst_sweep_compacts_slots() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    let config = RegistryConfig::default().with_heartbeat_delay_secs(1);
    let registry = registry(store, &clock, config);

    for id in 1..=5 {
        registry.heartbeat(&node(id)).await.unwrap();
    }
    clock.advance_ms(1_500);
    registry.heartbeat(&node(2)).await.unwrap();
    registry.heartbeat(&node(4)).await.unwrap();
    clock.advance_ms(1_000);

    // 1, 3, 5 are 2.5s stale; 2 and 4 only 1s
    registry.heartbeat(&node(6)).await.unwrap();

    let nodes = registry.get_nodes().await;
    assert_dense(&nodes);
    let ids: HashSet<i64> = nodes.values().map(|n| n.id).collect();
    assert_eq!(ids, HashSet::from([2, 4, 6]));
    assert_eq!(nodes[&2], node(6));
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn test_dst_swap_remove_across_instances() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    let writer = registry(store.clone(), &clock, RegistryConfig::default());
    let other = registry(store, &clock, RegistryConfig::default());

    for id in [1, 2, 3, 4] {
        writer.heartbeat(&node(id)).await.unwrap();
    }
    other.remove(&node(1)).await.unwrap();

    let expected = NodeSnapshot::from([(0, node(4)), (1, node(2)), (2, node(3))]);
    assert_eq!(writer.get_nodes().await, expected);
    assert_eq!(other.cached_nodes(), expected);
}

#[tokio::test]
async fn test_dst_remove_all_then_rejoin() {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    let registry = registry(store.clone(), &clock, RegistryConfig::default());

    registry.heartbeat(&node(1)).await.unwrap();
    registry.heartbeat(&node(2)).await.unwrap();
    registry.remove_all().await.unwrap();
    assert!(store.is_empty().await);

    registry.heartbeat(&node(2)).await.unwrap();
    assert_eq!(registry.get_nodes().await, NodeSnapshot::from([(0, node(2))]));
}

// =============================================================================
// Fault Injection
// =============================================================================

#[tokio::test]
async fn test_dst_heartbeats_under_faults() {
    let clock = ManualClock::default();
    let inner = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    let store = Arc::new(
        SimStore::new(inner.clone(), seed_from_env_or_random())
            .with_fault(FaultConfig::new(FaultType::CasConflict, 0.3))
            .with_fault(FaultConfig::new(FaultType::StoreWriteFail, 0.1))
            .with_fault(FaultConfig::new(FaultType::StoreReadFail, 0.1)),
    );
    let seed = store.seed();

    let registries: Vec<NodeRegistry> = (0..4)
        .map(|_| registry(store.clone(), &clock, RegistryConfig::default()))
        .collect();

    for round in 0..10 {
        for (i, registry) in registries.iter().enumerate() {
            let id = (round * registries.len() + i) as i64 % 8;
            heartbeat_until_committed(registry, &node(id))
                .await
                .unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
            clock.advance_ms(100);
        }
    }

    let clean = registry(inner, &clock, RegistryConfig::default());
    let nodes = clean.get_nodes().await;
    assert_dense(&nodes);
    assert_eq!(nodes.len(), 8, "seed {}: {:?}", seed, nodes);
    assert!(store.operation_count() > 0);
}

#[tokio::test]
async fn test_dst_reads_degrade_under_read_faults() {
    let seed = seed_from_env_or_random();
    let clock = ManualClock::default();
    let inner = Arc::new(MemoryStore::with_time(Arc::new(clock.clone())));
    registry(inner.clone(), &clock, RegistryConfig::default())
        .heartbeat(&node(1))
        .await
        .unwrap();

    let faulty = SimStore::new(inner, seed).with_fault(FaultConfig::new(FaultType::StoreReadFail, 0.5));
    let reader = registry(Arc::new(faulty), &clock, RegistryConfig::default());

    for _ in 0..50 {
        let nodes = reader.get_nodes().await;
        assert!(nodes.is_empty() || nodes == NodeSnapshot::from([(0, node(1))]));
    }
}
