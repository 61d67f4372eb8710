//! A live sync session: every informer, its adapter, and the shared stop signal.

use edgehold_types::{EdgeConfig, ResourceKind};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::adapter::KindAdapter;
use super::catalog::{build_factories, resolve_kinds};
use super::informer::InformerTiming;
use crate::error::{AppError, AppResult};
use crate::kube::ResourceApi;
use crate::store::LocalStore;
use crate::watch::SubscriberRegistry;

const DEFAULT_RELIST_BACKOFF: Duration = Duration::from_secs(1);
const INFORMER_EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub node_name: String,
    pub cache_sync_timeout: Duration,
    pub resync_period: Duration,
    pub relist_backoff: Duration,
}

impl SessionConfig {
    pub fn from_edge(config: &EdgeConfig) -> Self {
        Self {
            node_name: config.node_name.clone(),
            cache_sync_timeout: config.cache_sync_timeout(),
            resync_period: config.resync_period(),
            relist_backoff: DEFAULT_RELIST_BACKOFF,
        }
    }

    fn timing(&self) -> InformerTiming {
        InformerTiming { resync_period: self.resync_period, relist_backoff: self.relist_backoff }
    }
}

/// Exists only while attached. Never resumed: a new attachment starts a new session.
pub struct SyncSession {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    kinds: Vec<ResourceKind>,
}

impl SyncSession {
    /// Start informers for every resolved kind and wait for all of them to sync.
    ///
    /// Fails as a whole if any informer misses the cache-sync deadline; everything started
    /// so far is stopped before returning the error.
    pub async fn start(
        api: Arc<dyn ResourceApi>,
        store: Arc<LocalStore>,
        registry: Arc<SubscriberRegistry>,
        config: &SessionConfig,
    ) -> AppResult<Self> {
        let kinds = resolve_kinds(api.as_ref()).await?;
        let factories = build_factories(&kinds, &config.node_name, &api, config.timing());

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        let mut synced = Vec::new();
        for factory in &factories {
            tracing::debug!(scope = ?factory.scope(), kinds = ?factory.kinds(), "Starting informer factory");
            for informer in factory.informers() {
                let kind = informer.kind();
                let (event_tx, event_rx) = mpsc::channel(INFORMER_EVENT_BUFFER);
                let (synced_tx, synced_rx) = oneshot::channel();
                let adapter = KindAdapter::new(kind, Arc::clone(&store), Arc::clone(&registry));
                tasks.push(tokio::spawn(informer.run(event_tx, stop_rx.clone())));
                tasks.push(tokio::spawn(adapter.run(event_rx, synced_tx)));
                synced.push(async move { (kind, synced_rx.await.is_ok()) });
            }
        }

        let session = Self { stop_tx, tasks, kinds };
        match tokio::time::timeout(config.cache_sync_timeout, join_all(synced)).await {
            Ok(results) => {
                if let Some((kind, _)) = results.iter().find(|(_, ok)| !ok) {
                    let kind = *kind;
                    session.shutdown().await;
                    return Err(AppError::Sync(format!("informer for {kind} stopped before syncing")));
                }
            },
            Err(_) => {
                session.shutdown().await;
                return Err(AppError::Sync(format!(
                    "caches did not sync within {:?}",
                    config.cache_sync_timeout
                )));
            },
        }

        tracing::info!(kinds = session.kinds.len(), "Sync session started");
        Ok(session)
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    /// Signal every informer to stop. Adapters finish once their informer is gone.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait for every task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!("Sync task ended abnormally: {}", e);
            }
        }
        tracing::info!("Sync session stopped");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
