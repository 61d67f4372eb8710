//! Kind adapter: applies informer notifications to the local store and the watch registry.
//!
//! One adapter type serves every kind; the per-kind differences come from the
//! [`KindDescriptor`].

use edgehold_types::{KindDescriptor, ResourceKind, WatchEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::informer::InformerEvent;
use crate::store::LocalStore;
use crate::watch::SubscriberRegistry;

/// What an adapter did with one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Upserted,
    Deleted,
    /// Resync with an unchanged resourceVersion
    Suppressed,
    Synced,
    Failed,
}

pub struct KindAdapter {
    descriptor: &'static KindDescriptor,
    store: Arc<LocalStore>,
    registry: Arc<SubscriberRegistry>,
}

impl KindAdapter {
    pub fn new(kind: ResourceKind, store: Arc<LocalStore>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { descriptor: kind.descriptor(), store, registry }
    }

    pub fn kind(&self) -> ResourceKind {
        self.descriptor.kind
    }

    pub fn handle(&self, event: InformerEvent) -> Applied {
        let kind = self.kind();
        match event {
            InformerEvent::Added(mut obj) => {
                obj.stamp_type_meta(kind);
                if let Err(e) = self.store.upsert(kind, &obj) {
                    tracing::error!(%kind, key = %obj.key(), "Failed to store object: {}", e);
                    return Applied::Failed;
                }
                tracing::debug!(%kind, key = %obj.key(), "Added");
                self.registry.broadcast(kind, &WatchEvent::added(obj));
                Applied::Upserted
            },
            InformerEvent::Updated { old, mut new } => {
                if old.resource_version() == new.resource_version() {
                    return Applied::Suppressed;
                }
                new.stamp_type_meta(kind);
                if let Err(e) = self.store.upsert(kind, &new) {
                    tracing::error!(%kind, key = %new.key(), "Failed to store object: {}", e);
                    return Applied::Failed;
                }
                tracing::debug!(
                    %kind,
                    key = %new.key(),
                    from = old.resource_version().unwrap_or_default(),
                    to = new.resource_version().unwrap_or_default(),
                    "Modified"
                );
                self.registry.broadcast(kind, &WatchEvent::modified(new));
                Applied::Upserted
            },
            InformerEvent::Deleted(deleted) => {
                let key = deleted.key();
                if let Err(e) = self.store.remove(kind, &key) {
                    tracing::error!(%kind, %key, "Failed to remove object: {}", e);
                    return Applied::Failed;
                }
                let mut obj = deleted.into_object();
                obj.stamp_type_meta(kind);
                tracing::debug!(%kind, %key, "Deleted");
                self.registry.broadcast(kind, &WatchEvent::deleted(obj));
                Applied::Deleted
            },
            InformerEvent::Synced { keys } => {
                let dropped = self.store.retain_index(kind, &keys);
                tracing::info!(%kind, objects = keys.len(), dropped, "Cache synced");
                Applied::Synced
            },
        }
    }

    /// Drain `events` until the informer side closes. `synced` fires on the first
    /// [`InformerEvent::Synced`].
    pub async fn run(self, mut events: mpsc::Receiver<InformerEvent>, synced: oneshot::Sender<()>) {
        let mut synced = Some(synced);
        while let Some(event) = events.recv().await {
            if self.handle(event) == Applied::Synced {
                if let Some(tx) = synced.take() {
                    let _ = tx.send(());
                }
            }
        }
        tracing::debug!(kind = %self.kind(), "Adapter stopped");
    }
}
