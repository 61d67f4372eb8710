//! List-then-watch informer for one kind.
//!
//! Keeps a private cache of the last known state and turns list results and watch events
//! into add/update/delete notifications. A watch that ends or errors leads to a re-list;
//! objects that vanished in between are reported as [`DeletedObject::FinalStateUnknown`].

use edgehold_types::{ResourceKind, ResourceObject, WatchEvent, WatchEventType};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::error::AppResult;
use crate::kube::{ListParams, ResourceApi, WatchStream};

/// A delete notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedObject {
    /// Seen on the watch stream with its final state
    Known(ResourceObject),
    /// Missing from a re-list; only the last cached state is known
    FinalStateUnknown { key: String, last_known: ResourceObject },
}

impl DeletedObject {
    pub fn key(&self) -> String {
        match self {
            Self::Known(obj) => obj.key(),
            Self::FinalStateUnknown { key, .. } => key.clone(),
        }
    }

    pub fn into_object(self) -> ResourceObject {
        match self {
            Self::Known(obj) | Self::FinalStateUnknown { last_known: obj, .. } => obj,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InformerEvent {
    Added(ResourceObject),
    /// Also emitted on resync with identical resourceVersions
    Updated { old: ResourceObject, new: ResourceObject },
    Deleted(DeletedObject),
    /// Initial list delivered; `keys` is the complete set it contained
    Synced { keys: HashSet<String> },
}

#[derive(Debug, Clone, Copy)]
pub struct InformerTiming {
    pub resync_period: Duration,
    pub relist_backoff: Duration,
}

enum Step {
    Event(Option<AppResult<WatchEvent>>),
    Resync,
    Stop,
}

pub struct Informer {
    api: Arc<dyn ResourceApi>,
    kind: ResourceKind,
    params: ListParams,
    timing: InformerTiming,
    cache: HashMap<String, ResourceObject>,
}

impl Informer {
    pub fn new(
        api: Arc<dyn ResourceApi>,
        kind: ResourceKind,
        params: ListParams,
        timing: InformerTiming,
    ) -> Self {
        Self { api, kind, params, timing, cache: HashMap::new() }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Run until `stop` flips or the receiver of `tx` goes away.
    pub async fn run(mut self, tx: mpsc::Sender<InformerEvent>, mut stop: watch::Receiver<bool>) {
        let kind = self.kind;
        let mut synced = false;
        loop {
            if *stop.borrow() {
                break;
            }
            let list = tokio::select! {
                list = self.api.list(kind, &self.params) => list,
                _ = stop.changed() => break,
            };
            let list = match list {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(%kind, "List failed: {}", e);
                    if !self.backoff(&mut stop).await {
                        break;
                    }
                    continue;
                },
            };

            let mut events = self.replace(list.items);
            if !synced {
                events.push(InformerEvent::Synced { keys: self.cache.keys().cloned().collect() });
                synced = true;
            }
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            let watch = tokio::select! {
                watch = self.api.watch(kind, &self.params, &list.resource_version) => watch,
                _ = stop.changed() => break,
            };
            match watch {
                Ok(stream) => {
                    if !self.follow(stream, &tx, &mut stop).await {
                        break;
                    }
                },
                Err(e) => tracing::warn!(%kind, "Watch failed: {}", e),
            }
            if !self.backoff(&mut stop).await {
                break;
            }
        }
        tracing::debug!(%kind, "Informer stopped");
    }

    /// Consume a watch stream. Returns `false` when the informer must stop.
    async fn follow(
        &mut self,
        mut stream: WatchStream,
        tx: &mpsc::Sender<InformerEvent>,
        stop: &mut watch::Receiver<bool>,
    ) -> bool {
        let kind = self.kind;
        let period = self.timing.resync_period.max(Duration::from_millis(1));
        let mut resync = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            let step = tokio::select! {
                event = stream.next() => Step::Event(event),
                _ = resync.tick() => Step::Resync,
                _ = stop.changed() => Step::Stop,
            };
            let events = match step {
                Step::Stop => return false,
                Step::Event(None) => {
                    tracing::debug!(%kind, "Watch closed, re-listing");
                    return true;
                },
                Step::Event(Some(Err(e))) => {
                    tracing::warn!(%kind, "Watch error, re-listing: {}", e);
                    return true;
                },
                Step::Event(Some(Ok(event))) => self.apply(event).into_iter().collect(),
                Step::Resync => self.resync(),
            };
            for event in events {
                if tx.send(event).await.is_err() {
                    return false;
                }
            }
        }
    }

    fn apply(&mut self, event: WatchEvent) -> Option<InformerEvent> {
        let obj = event.object;
        let key = obj.key();
        match event.event_type {
            WatchEventType::Added | WatchEventType::Modified => {
                match self.cache.insert(key, obj.clone()) {
                    Some(old) => Some(InformerEvent::Updated { old, new: obj }),
                    None => Some(InformerEvent::Added(obj)),
                }
            },
            WatchEventType::Deleted => {
                self.cache.remove(&key);
                Some(InformerEvent::Deleted(DeletedObject::Known(obj)))
            },
        }
    }

    /// Swap the cache for a fresh list and diff the two.
    fn replace(&mut self, mut items: Vec<ResourceObject>) -> Vec<InformerEvent> {
        let mut previous = std::mem::take(&mut self.cache);
        let mut events = Vec::new();

        items.sort_by_key(ResourceObject::key);
        for obj in items {
            let key = obj.key();
            match previous.remove(&key) {
                None => events.push(InformerEvent::Added(obj.clone())),
                Some(old) if old.resource_version() != obj.resource_version() => {
                    events.push(InformerEvent::Updated { old, new: obj.clone() });
                },
                Some(_) => {},
            }
            self.cache.insert(key, obj);
        }

        let mut gone: Vec<(String, ResourceObject)> = previous.into_iter().collect();
        gone.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, last_known) in gone {
            events.push(InformerEvent::Deleted(DeletedObject::FinalStateUnknown { key, last_known }));
        }
        events
    }

    fn resync(&self) -> Vec<InformerEvent> {
        self.cache
            .values()
            .map(|obj| InformerEvent::Updated { old: obj.clone(), new: obj.clone() })
            .collect()
    }

    /// Sleep before the next list. Returns `false` if stopped meanwhile.
    async fn backoff(&self, stop: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            () = tokio::time::sleep(self.timing.relist_backoff) => true,
            _ = stop.changed() => false,
        }
    }
}
