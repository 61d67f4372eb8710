//! Test helpers for edgehold-server unit tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use edgehold_core::connectivity::{ConnectivityMonitor, MonitorConfig};
use edgehold_core::edge::EdgeAgent;
use edgehold_core::kube::MemoryResourceApi;
use edgehold_core::reconciler::UpstreamReconciler;
use edgehold_core::store::LocalStore;
use edgehold_core::syncer::SessionConfig;
use edgehold_core::watch::SubscriberRegistry;

use crate::state::{CentralState, EdgeState};

pub const TEST_CLUSTER: &str = "cluster1";

/// Edge state over a fresh on-disk store, detached, with an idle monitor.
///
/// Returns `(EdgeState, TempDir)`; keep `TempDir` alive for the test duration.
pub fn test_edge_state() -> (EdgeState, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let store = Arc::new(LocalStore::open(temp_dir.path()).expect("failed to open store"));
    let api = Arc::new(MemoryResourceApi::new());
    let session = SessionConfig {
        node_name: "edge-1".to_string(),
        cache_sync_timeout: Duration::from_secs(2),
        resync_period: Duration::from_secs(300),
        relist_backoff: Duration::from_millis(20),
    };
    let agent =
        EdgeAgent::new(api, store, SubscriberRegistry::new(8), session, Duration::from_secs(5));
    let (monitor, _signals) = ConnectivityMonitor::new(MonitorConfig {
        fallback_server: "127.0.0.1:1".to_string(),
        health_check_interval: Duration::from_secs(2),
        dial_timeout: Duration::from_millis(100),
        discovery_retry: Duration::from_secs(5),
    });

    (EdgeState::new(agent, monitor, TEST_CLUSTER), temp_dir)
}

/// Central state backed by an in-memory API server.
pub fn test_central_state() -> (CentralState, Arc<MemoryResourceApi>) {
    let api = Arc::new(MemoryResourceApi::new());
    let reconciler = UpstreamReconciler::new(api.clone(), 3);
    (CentralState::new(reconciler), api)
}
