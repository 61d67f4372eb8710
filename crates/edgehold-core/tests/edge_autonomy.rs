#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test: panics are the assertion mechanism")]

use std::sync::Arc;
use std::time::Duration;

use edgehold_core::connectivity::RemoteSignal;
use edgehold_core::edge::{ConnectionState, EdgeAgent, ReportBuilder};
use edgehold_core::kube::{MemoryResourceApi, ResourceApi};
use edgehold_core::reconciler::UpstreamReconciler;
use edgehold_core::store::{LocalStore, StoreMode};
use edgehold_core::syncer::SessionConfig;
use edgehold_core::watch::SubscriberRegistry;
use edgehold_types::{ResourceKind, ResourceObject, WatchEventType};

fn session_config() -> SessionConfig {
    SessionConfig {
        node_name: "edge-1".to_string(),
        cache_sync_timeout: Duration::from_secs(2),
        resync_period: Duration::from_secs(300),
        relist_backoff: Duration::from_millis(20),
    }
}

fn config_map(name: &str) -> ResourceObject {
    ResourceObject::new(ResourceKind::ConfigMap, Some("apps"), name)
}

#[tokio::test]
async fn test_edge_survives_restart_while_disconnected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = Arc::new(MemoryResourceApi::new());
    api.create(ResourceKind::ConfigMap, &config_map("settings")).await.expect("create");

    {
        let store = Arc::new(LocalStore::open(dir.path()).expect("open"));
        let agent = EdgeAgent::new(
            api.clone(),
            store,
            SubscriberRegistry::new(16),
            session_config(),
            Duration::from_secs(5),
        );
        agent.handle_signal(RemoteSignal::Ready).await.expect("attach");
        agent.handle_signal(RemoteSignal::NotReady).await.expect("detach");
    }

    // Restarted with no central API at all: local state is still served.
    let store = LocalStore::open(dir.path()).expect("reopen");
    assert_eq!(store.mode(), StoreMode::Disconnected);
    let obj = store.get("configmaps", "apps/settings").expect("served from disk");
    assert_eq!(obj.type_kind(), Some("ConfigMap"));
}

#[tokio::test]
async fn test_local_watchers_follow_central_changes() {
    let api = Arc::new(MemoryResourceApi::new());
    let registry = SubscriberRegistry::new(16);
    let agent = EdgeAgent::new(
        api.clone(),
        Arc::new(LocalStore::open_in_memory().expect("store")),
        Arc::clone(&registry),
        session_config(),
        Duration::from_secs(5),
    );
    agent.handle_signal(RemoteSignal::Ready).await.expect("attach");
    let mut sub = registry.subscribe(ResourceKind::ConfigMap);

    api.create(ResourceKind::ConfigMap, &config_map("live")).await.expect("create");
    let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("event in time")
        .expect("subscription open");
    assert_eq!(event.event_type, WatchEventType::Added);
    assert_eq!(event.object.key(), "apps/live");
    agent.detach().await;
}

#[tokio::test]
async fn test_edge_state_reaches_the_center() {
    let edge_api = Arc::new(MemoryResourceApi::new());
    edge_api.create(ResourceKind::ConfigMap, &config_map("a")).await.expect("create");
    edge_api.create(ResourceKind::ConfigMap, &config_map("b")).await.expect("create");

    let store = Arc::new(LocalStore::open_in_memory().expect("store"));
    let agent = EdgeAgent::new(
        edge_api.clone(),
        Arc::clone(&store),
        SubscriberRegistry::new(16),
        session_config(),
        Duration::from_secs(5),
    );
    agent.handle_signal(RemoteSignal::Ready).await.expect("attach");
    assert_eq!(agent.state(), ConnectionState::Connected);

    let center = Arc::new(MemoryResourceApi::new());
    let center_api: Arc<dyn ResourceApi> = center.clone();
    let reconciler = UpstreamReconciler::new(center_api, 5);
    let builder = ReportBuilder::new("edge-a", Arc::clone(&store));

    let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
    assert_eq!(summary.created, 2);

    // Unchanged state reported again changes nothing.
    let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.deleted, 0);

    edge_api.delete(ResourceKind::ConfigMap, Some("apps"), "b").await.expect("delete");
    let gone = async {
        while store.get_kind(ResourceKind::ConfigMap, "apps/b").is_ok() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), gone).await.expect("delete synced");

    let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
    assert_eq!(summary.deleted, 1);
    assert_eq!(center.object_count(ResourceKind::ConfigMap), 1);
    agent.detach().await;
}

#[tokio::test]
async fn test_detached_edits_reach_the_center() {
    let edge_api = Arc::new(MemoryResourceApi::new());
    edge_api.create(ResourceKind::ConfigMap, &config_map("a")).await.expect("create");

    let store = Arc::new(LocalStore::open_in_memory().expect("store"));
    let agent = EdgeAgent::new(
        edge_api.clone(),
        Arc::clone(&store),
        SubscriberRegistry::new(16),
        session_config(),
        Duration::from_secs(5),
    );
    agent.handle_signal(RemoteSignal::Ready).await.expect("attach");

    let center = Arc::new(MemoryResourceApi::new());
    let center_api: Arc<dyn ResourceApi> = center.clone();
    let reconciler = UpstreamReconciler::new(center_api, 5);
    let builder = ReportBuilder::new("edge-a", Arc::clone(&store));
    let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
    assert_eq!(summary.created, 1);

    agent.handle_signal(RemoteSignal::NotReady).await.expect("detach");
    let mut edited = store.get_kind(ResourceKind::ConfigMap, "apps/a").expect("served locally");
    edited.set_label("tier", "edge");
    store.client_put(ResourceKind::ConfigMap, &edited).expect("local write");

    let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
    assert_eq!(summary.updated, 1);
    let central = center.get(ResourceKind::ConfigMap, Some("apps"), "a-edge-a").await.expect("copy");
    assert_eq!(central.label("tier"), Some("edge"));
}

#[tokio::test]
async fn test_central_copies_are_not_reported_back() {
    // The edge syncs from the same API the reconciler writes to.
    let api = Arc::new(MemoryResourceApi::new());
    api.create(ResourceKind::ConfigMap, &config_map("a")).await.expect("create");

    let store = Arc::new(LocalStore::open_in_memory().expect("store"));
    let agent = EdgeAgent::new(
        api.clone(),
        Arc::clone(&store),
        SubscriberRegistry::new(16),
        session_config(),
        Duration::from_secs(5),
    );
    agent.handle_signal(RemoteSignal::Ready).await.expect("attach");

    let shared: Arc<dyn ResourceApi> = api.clone();
    let reconciler = UpstreamReconciler::new(shared, 5);
    let builder = ReportBuilder::new("edge-a", Arc::clone(&store));
    let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
    assert_eq!(summary.created, 1);

    let mirrored = async {
        while store.get_kind(ResourceKind::ConfigMap, "apps/a-edge-a").is_err() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), mirrored).await.expect("copy synced back");

    for _ in 0..3 {
        let summary = reconciler.apply_report(&builder.full_report(ResourceKind::ConfigMap)).await;
        assert_eq!(summary.created, 0);
        assert_eq!(summary.deleted, 0);
    }
    assert_eq!(api.object_count(ResourceKind::ConfigMap), 2);
    agent.detach().await;
}
