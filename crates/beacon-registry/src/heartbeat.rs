//! Periodic heartbeat publisher
//!
//! TigerStyle: Explicit task lifecycle, graceful shutdown via channel.
//!
//! A node that wants to stay registered heartbeats itself every
//! `heartbeat_delay_secs`. A failed heartbeat is logged and the loop carries
//! on; the next tick is the retry.

use crate::registry::NodeRegistry;
use beacon_core::Node;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Background task heartbeating one node into one registry
pub struct HeartbeatPublisher {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl HeartbeatPublisher {
    /// Start heartbeating `node`, first beat immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(registry: Arc<NodeRegistry>, node: Node) -> Self {
        let period = Duration::from_secs(registry.config().heartbeat_delay_secs);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed() => {
                        // Sender dropped counts as shutdown too
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match registry.heartbeat(&node).await {
                    Ok(()) => debug!(key = registry.key(), node = %node, "heartbeat sent"),
                    Err(e) => {
                        warn!(key = registry.key(), node = %node, error = %e, "heartbeat failed")
                    }
                }
            }

            info!(key = registry.key(), node = %node, "heartbeat publisher stopped");
        });

        Self {
            handle: Some(handle),
            shutdown_tx,
        }
    }

    /// Stop the task and wait for it to exit
    ///
    /// A heartbeat already in flight completes first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "heartbeat publisher task failed");
            }
        }
    }
}

impl Drop for HeartbeatPublisher {
    fn drop(&mut self) {
        // Signal shutdown if not already done
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{ManualClock, NodeSnapshot, RegistryConfig};
    use beacon_storage::{FaultConfig, FaultType, MemoryStore, SimStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_over(store: Arc<dyn beacon_storage::StoreAdapter>) -> Arc<NodeRegistry> {
        let clock = ManualClock::default();
        Arc::new(
            NodeRegistry::with_time(
                store,
                beacon_core::REGISTRY_KEY_CLIENT_NODES,
                RegistryConfig::default().with_heartbeat_delay_secs(5),
                Arc::new(clock),
            )
            .unwrap(),
        )
    }

    fn count_commits(registry: &NodeRegistry) -> Arc<AtomicUsize> {
        let commits = Arc::new(AtomicUsize::new(0));
        let sink = commits.clone();
        registry.set_listener(move |_: &NodeSnapshot, _: &NodeSnapshot| -> anyhow::Result<()> {
            sink.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        commits
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_every_period() {
        let registry = registry_over(Arc::new(MemoryStore::new()));
        let commits = count_commits(&registry);
        let node = Node::new(1, "http://1").unwrap();

        let publisher = HeartbeatPublisher::start(registry.clone(), node.clone());
        tokio::time::sleep(Duration::from_secs(11)).await;

        // Beats at t = 0, 5, 10
        assert!(commits.load(Ordering::SeqCst) >= 2);
        assert_eq!(registry.cached_nodes(), NodeSnapshot::from([(0, node)]));

        publisher.shutdown().await;
        let after_shutdown = commits.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(commits.load(Ordering::SeqCst), after_shutdown);

        registry.clear_listener();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_running_after_failures() {
        // The first two heartbeats fail on every attempt
        let store = SimStore::new(MemoryStore::new(), 11).with_fault(
            FaultConfig::new(FaultType::StoreReadFail, 1.0).max_triggers(10),
        );
        let registry = registry_over(Arc::new(store));
        let node = Node::new(2, "http://2").unwrap();

        let publisher = HeartbeatPublisher::start(registry.clone(), node.clone());
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(registry.cached_nodes(), NodeSnapshot::from([(0, node)]));
        publisher.shutdown().await;
    }
}
