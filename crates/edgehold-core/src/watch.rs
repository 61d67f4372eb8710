//! Watch subscriber registry.
//!
//! Fans watch events of a kind out to every local watch connection. Each subscriber owns
//! a bounded channel; delivery never blocks the caller. A subscriber whose buffer is full
//! or whose receiver is gone is evicted after the broadcast, which ends its stream and
//! makes the client re-list.
//!
//! Filtering by namespace, name or fields is the subscriber's job.

use edgehold_types::{ResourceKind, WatchEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<ResourceKind, HashMap<String, mpsc::Sender<WatchEvent>>>>,
    buffer: usize,
}

impl SubscriberRegistry {
    pub fn new(buffer: usize) -> Arc<Self> {
        Arc::new(Self { subscribers: RwLock::new(HashMap::new()), buffer: buffer.max(1) })
    }

    /// Register `tx` under `(kind, id)`. A no-op returning `false` if `id` is taken.
    pub fn add(&self, kind: ResourceKind, id: &str, tx: mpsc::Sender<WatchEvent>) -> bool {
        let mut subscribers = self.subscribers.write();
        let per_kind = subscribers.entry(kind).or_default();
        if per_kind.contains_key(id) {
            return false;
        }
        per_kind.insert(id.to_string(), tx);
        tracing::debug!(%kind, id, "Watch subscriber added");
        true
    }

    /// Remove `(kind, id)`. Returns whether it was registered.
    pub fn delete(&self, kind: ResourceKind, id: &str) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(per_kind) = subscribers.get_mut(&kind) else {
            return false;
        };
        let removed = per_kind.remove(id).is_some();
        if per_kind.is_empty() {
            subscribers.remove(&kind);
        }
        if removed {
            tracing::debug!(%kind, id, "Watch subscriber removed");
        }
        removed
    }

    /// Register a fresh subscriber with a generated id. Dropping the returned
    /// [`Subscription`] unregisters it.
    pub fn subscribe(self: &Arc<Self>, kind: ResourceKind) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = uuid::Uuid::new_v4().to_string();
        self.add(kind, &id, tx);
        Subscription { registry: Arc::clone(self), kind, id, rx }
    }

    /// Deliver `event` to every subscriber of `kind`. Returns the number of deliveries.
    ///
    /// Mutation is excluded for the duration of the send pass.
    pub fn broadcast(&self, kind: ResourceKind, event: &WatchEvent) -> usize {
        let mut delivered = 0;
        let mut evict = Vec::new();
        {
            let subscribers = self.subscribers.read();
            let Some(per_kind) = subscribers.get(&kind) else {
                return 0;
            };
            for (id, tx) in per_kind {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(%kind, id, "Watch subscriber too slow, evicting");
                        evict.push(id.clone());
                    },
                    Err(TrySendError::Closed(_)) => evict.push(id.clone()),
                }
            }
        }
        for id in evict {
            self.delete(kind, &id);
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: ResourceKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, HashMap::len)
    }
}

/// A live registration. Receives events until dropped or evicted.
pub struct Subscription {
    registry: Arc<SubscriberRegistry>,
    kind: ResourceKind,
    id: String,
    rx: mpsc::Receiver<WatchEvent>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event, or `None` once evicted.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.delete(self.kind, &self.id);
    }
}
