//! `edgehold edge`: wires the connectivity monitor, local store, syncer and local API.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use edgehold_core::connectivity::{ConnectivityMonitor, MonitorConfig};
use edgehold_core::edge::EdgeAgent;
use edgehold_core::kube::{HttpResourceApi, ResourceApi};
use edgehold_core::store::LocalStore;
use edgehold_core::syncer::SessionConfig;
use edgehold_core::watch::SubscriberRegistry;
use edgehold_types::EdgeConfig;

use crate::router::build_edge_router;
use crate::server_utils::{create_listener, shutdown_signal};
use crate::state::EdgeState;

pub async fn run(config: EdgeConfig) -> Result<()> {
    info!(
        cluster = %config.cluster_id,
        node = %config.node_name,
        "Starting edgehold edge agent"
    );

    let (monitor, signals) = ConnectivityMonitor::new(MonitorConfig::from_edge(&config));
    let health_task = monitor.start_health_task();

    let proxy_listener = create_listener(&config.proxy_listen_addr)
        .with_context(|| format!("binding proxy on {}", config.proxy_listen_addr))?;
    info!("Central API proxy listening on {}", config.proxy_listen_addr);
    let proxy_task = monitor.start_proxy_task(proxy_listener);

    let api: Arc<dyn ResourceApi> = Arc::new(HttpResourceApi::new(
        config.api_server_url.clone(),
        config.bearer_token.clone(),
        config.dial_timeout(),
    )?);
    let discovery_task = monitor.start_discovery_task(Arc::clone(&api));

    let store = Arc::new(
        LocalStore::open(&config.data_dir)
            .with_context(|| format!("opening store in {}", config.data_dir.display()))?,
    );
    info!(rows = store.persisted_len()?, mode = %store.mode(), "Local store opened");

    let registry = SubscriberRegistry::new(config.watch_buffer);
    let agent = EdgeAgent::new(
        api,
        store,
        registry,
        SessionConfig::from_edge(&config),
        config.attach_retry(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent_task = agent.start_agent_task(signals, shutdown_rx);

    let state = EdgeState::new(agent, Arc::clone(&monitor), &config.cluster_id);
    let app = build_edge_router(state);
    let listener = create_listener(&config.http_listen_addr)
        .with_context(|| format!("binding local API on {}", config.http_listen_addr))?;
    info!("Local API listening on http://{}", config.http_listen_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    monitor.stop();
    for task in [agent_task, health_task, proxy_task, discovery_task] {
        if let Err(e) = task.await {
            tracing::warn!("Background task ended abnormally: {}", e);
        }
    }
    info!("Edge agent stopped");
    Ok(())
}
