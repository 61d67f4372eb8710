//! In-process API server.
//!
//! Keeps every object in memory with a single monotonically increasing revision counter
//! shared by all kinds, assigns UIDs on create, rejects writes whose resourceVersion is
//! stale, and fans watch events out over a `broadcast` channel. A bounded event history
//! lets watches resume from a recent resourceVersion; anything older gets `410 Gone`.
//!
//! Test hooks simulate the failure modes the engine has to survive: unsupported kinds,
//! injected write conflicts, a failing server and watches cut without a final event.

use async_trait::async_trait;
use edgehold_types::{object_key, ApiError, ResourceKind, ResourceObject, WatchEvent};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tokio::sync::{broadcast, watch};

use super::{ListParams, ObjectList, ResourceApi, WatchStream};
use crate::error::{AppError, AppResult};

const HISTORY_LIMIT: usize = 1024;
const BROADCAST_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
struct Recorded {
    revision: u64,
    kind: ResourceKind,
    event: WatchEvent,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<ResourceKind, BTreeMap<String, ResourceObject>>,
    revision: u64,
    history: VecDeque<Recorded>,
    /// Highest revision evicted from `history`.
    compacted: u64,
    unsupported: HashSet<ResourceKind>,
    pending_conflicts: u32,
    failing: bool,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn ensure_available(&self, kind: ResourceKind) -> AppResult<()> {
        if self.failing {
            return Err(ApiError::Transport { message: "api server unavailable".to_string() }.into());
        }
        if self.unsupported.contains(&kind) {
            return Err(ApiError::Unsupported { kind: kind.as_str().to_string() }.into());
        }
        Ok(())
    }

    fn take_conflict(&mut self, kind: ResourceKind, name: &str) -> AppResult<()> {
        if self.pending_conflicts > 0 {
            self.pending_conflicts -= 1;
            return Err(conflict(kind, name));
        }
        Ok(())
    }

    fn record(
        &mut self,
        events: &broadcast::Sender<Recorded>,
        revision: u64,
        kind: ResourceKind,
        event: WatchEvent,
    ) {
        let recorded = Recorded { revision, kind, event };
        if self.history.len() >= HISTORY_LIMIT {
            if let Some(evicted) = self.history.pop_front() {
                self.compacted = evicted.revision;
            }
        }
        self.history.push_back(recorded.clone());
        // No receivers is fine; nobody is watching.
        let _ = events.send(recorded);
    }
}

fn conflict(kind: ResourceKind, name: &str) -> AppError {
    ApiError::Conflict { kind: kind.as_str().to_string(), name: name.to_string() }.into()
}

fn not_found(kind: ResourceKind, name: &str) -> AppError {
    ApiError::NotFound { kind: kind.as_str().to_string(), name: name.to_string() }.into()
}

fn namespace_for(kind: ResourceKind, namespace: Option<&str>) -> Option<&str> {
    if kind.descriptor().namespaced {
        namespace
    } else {
        None
    }
}

pub struct MemoryResourceApi {
    inner: Mutex<Inner>,
    events: broadcast::Sender<Recorded>,
    /// Bumped to cut every open watch stream.
    epoch: watch::Sender<u64>,
}

impl Default for MemoryResourceApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceApi {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (epoch, _) = watch::channel(0);
        Self { inner: Mutex::new(Inner::default()), events, epoch }
    }

    /// Make list/watch/writes on `kind` fail as if the server lacked the API group.
    pub fn set_unsupported(&self, kind: ResourceKind, unsupported: bool) {
        let mut inner = self.inner.lock();
        if unsupported {
            inner.unsupported.insert(kind);
        } else {
            inner.unsupported.remove(&kind);
        }
    }

    /// Fail the next `count` replace/replace_status calls with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.inner.lock().pending_conflicts = count;
    }

    /// Simulate an unreachable server. Going down also cuts open watches.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
        if failing {
            self.close_watches();
        }
    }

    /// End every open watch stream without a final event.
    pub fn close_watches(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }

    /// Delete an object without emitting a watch event, as if the deletion happened
    /// while a watcher was disconnected.
    pub fn remove_silently(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> bool {
        let key = object_key(namespace_for(kind, namespace), name);
        let mut inner = self.inner.lock();
        let removed = inner.objects.get_mut(&kind).and_then(|m| m.remove(&key)).is_some();
        if removed {
            inner.next_revision();
        }
        removed
    }

    pub fn object_count(&self, kind: ResourceKind) -> usize {
        self.inner.lock().objects.get(&kind).map_or(0, BTreeMap::len)
    }

    fn upsert(
        &self,
        kind: ResourceKind,
        obj: &ResourceObject,
        mode: WriteMode,
    ) -> AppResult<ResourceObject> {
        let desc = kind.descriptor();
        let namespace = namespace_for(kind, obj.namespace());
        if desc.namespaced && namespace.is_none() {
            return Err(ApiError::Status {
                code: 400,
                message: format!("{} {} requires a namespace", kind, obj.name()),
            }
            .into());
        }
        let key = object_key(namespace, obj.name());

        let mut inner = self.inner.lock();
        inner.ensure_available(kind)?;
        if mode != WriteMode::Create {
            inner.take_conflict(kind, obj.name())?;
        }

        let existing = inner.objects.get(&kind).and_then(|m| m.get(&key)).cloned();
        let mut stored = match (mode, existing) {
            (WriteMode::Create, Some(_)) => {
                return Err(ApiError::AlreadyExists {
                    kind: kind.as_str().to_string(),
                    name: obj.name().to_string(),
                }
                .into());
            },
            (WriteMode::Create, None) => {
                let mut created = obj.clone();
                created.set_uid(Some(&uuid::Uuid::new_v4().to_string()));
                if desc.has_status {
                    created.set_status(None);
                }
                created
            },
            (_, None) => return Err(not_found(kind, obj.name())),
            (mode, Some(current)) => {
                if let Some(rv) = obj.resource_version() {
                    if Some(rv) != current.resource_version() {
                        return Err(conflict(kind, obj.name()));
                    }
                }
                if let (Some(uid), Some(current_uid)) = (obj.uid(), current.uid()) {
                    if uid != current_uid {
                        return Err(conflict(kind, obj.name()));
                    }
                }
                let mut next = if mode == WriteMode::Status {
                    let mut next = current.clone();
                    next.set_status(obj.status().cloned());
                    next
                } else {
                    let mut next = obj.clone();
                    if desc.has_status {
                        next.set_status(current.status().cloned());
                    }
                    next
                };
                next.set_uid(current.uid());
                next
            },
        };

        let revision = inner.next_revision();
        stored.set_namespace(namespace);
        stored.set_resource_version(Some(&revision.to_string()));
        stored.stamp_type_meta(kind);
        inner.objects.entry(kind).or_default().insert(key, stored.clone());

        let event = if mode == WriteMode::Create {
            WatchEvent::added(stored.clone())
        } else {
            WatchEvent::modified(stored.clone())
        };
        inner.record(&self.events, revision, kind, event);
        Ok(stored)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Replace,
    Status,
}

#[async_trait]
impl ResourceApi for MemoryResourceApi {
    async fn list(&self, kind: ResourceKind, params: &ListParams) -> AppResult<ObjectList> {
        let inner = self.inner.lock();
        inner.ensure_available(kind)?;
        let items = inner
            .objects
            .get(&kind)
            .map(|m| m.values().filter(|o| params.matches(o)).cloned().collect())
            .unwrap_or_default();
        Ok(ObjectList { items, resource_version: inner.revision.to_string() })
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        resource_version: &str,
    ) -> AppResult<WatchStream> {
        let (backlog, mut events, mut epoch) = {
            let inner = self.inner.lock();
            inner.ensure_available(kind)?;
            let from = if resource_version.is_empty() {
                inner.revision
            } else {
                resource_version.parse::<u64>().map_err(|_| ApiError::Status {
                    code: 400,
                    message: format!("invalid resourceVersion {resource_version:?}"),
                })?
            };
            if from < inner.compacted {
                return Err(ApiError::Status {
                    code: 410,
                    message: format!("too old resource version: {from} ({})", inner.compacted),
                }
                .into());
            }
            let backlog: Vec<Recorded> =
                inner.history.iter().filter(|r| r.revision > from).cloned().collect();
            // Subscribed under the lock, so nothing falls between backlog and live events.
            (backlog, self.events.subscribe(), self.epoch.subscribe())
        };

        let params = params.clone();
        let stream = async_stream::stream! {
            for recorded in backlog {
                if recorded.kind == kind && params.matches(&recorded.event.object) {
                    yield Ok(recorded.event);
                }
            }
            loop {
                let next = tokio::select! {
                    received = events.recv() => Some(received),
                    _ = epoch.changed() => None,
                };
                match next {
                    Some(Ok(recorded)) => {
                        if recorded.kind == kind && params.matches(&recorded.event.object) {
                            yield Ok(recorded.event);
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        yield Err(AppError::from(ApiError::Status {
                            code: 410,
                            message: format!("watch fell behind by {skipped} events"),
                        }));
                        break;
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) | None => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> AppResult<ResourceObject> {
        let inner = self.inner.lock();
        inner.ensure_available(kind)?;
        let key = object_key(namespace_for(kind, namespace), name);
        inner
            .objects
            .get(&kind)
            .and_then(|m| m.get(&key))
            .cloned()
            .ok_or_else(|| not_found(kind, name))
    }

    async fn create(&self, kind: ResourceKind, obj: &ResourceObject) -> AppResult<ResourceObject> {
        if obj.resource_version().is_some() {
            return Err(ApiError::Status {
                code: 400,
                message: "resourceVersion should not be set on objects to be created".to_string(),
            }
            .into());
        }
        self.upsert(kind, obj, WriteMode::Create)
    }

    async fn replace(&self, kind: ResourceKind, obj: &ResourceObject) -> AppResult<ResourceObject> {
        self.upsert(kind, obj, WriteMode::Replace)
    }

    async fn replace_status(
        &self,
        kind: ResourceKind,
        obj: &ResourceObject,
    ) -> AppResult<ResourceObject> {
        self.upsert(kind, obj, WriteMode::Status)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> AppResult<()> {
        let key = object_key(namespace_for(kind, namespace), name);
        let mut inner = self.inner.lock();
        inner.ensure_available(kind)?;
        let Some(mut removed) = inner.objects.get_mut(&kind).and_then(|m| m.remove(&key)) else {
            return Err(not_found(kind, name));
        };
        let revision = inner.next_revision();
        removed.set_resource_version(Some(&revision.to_string()));
        inner.record(&self.events, revision, kind, WatchEvent::deleted(removed));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgehold_types::WatchEventType;
    use futures::StreamExt;
    use serde_json::json;

    fn pod(name: &str, node: &str) -> ResourceObject {
        ResourceObject::try_from(json!({
            "metadata": {"name": name, "namespace": "ns1", "labels": {"app": "web"}},
            "spec": {"nodeName": node},
            "status": {"phase": "Running"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_uid_and_drops_status() {
        let api = MemoryResourceApi::new();
        let created = api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap();
        assert!(created.uid().is_some());
        assert_eq!(created.resource_version(), Some("1"));
        assert!(created.status().is_none());

        let err = api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap_err();
        assert!(matches!(err, AppError::Api(ref e) if e.is_already_exists()));
    }

    #[tokio::test]
    async fn test_stale_resource_version_conflicts() {
        let api = MemoryResourceApi::new();
        let created = api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap();
        let updated = api.replace(ResourceKind::Pod, &created).await.unwrap();
        assert_eq!(updated.resource_version(), Some("2"));

        // `created` still carries revision 1
        let err = api.replace(ResourceKind::Pod, &created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_status_subresource_is_independent() {
        let api = MemoryResourceApi::new();
        let created = api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap();

        let mut with_status = created.clone();
        with_status.set_status(Some(json!({"phase": "Running"})));
        let after_status = api.replace_status(ResourceKind::Pod, &with_status).await.unwrap();
        assert_eq!(after_status.status(), Some(&json!({"phase": "Running"})));

        let mut spec_only = after_status.without_status();
        spec_only.set_label("tier", "edge");
        let after_spec = api.replace(ResourceKind::Pod, &spec_only).await.unwrap();
        assert_eq!(after_spec.label("tier"), Some("edge"));
        assert_eq!(after_spec.status(), Some(&json!({"phase": "Running"})));
    }

    #[tokio::test]
    async fn test_list_applies_selectors() {
        let api = MemoryResourceApi::new();
        api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap();
        api.create(ResourceKind::Pod, &pod("b", "n2")).await.unwrap();

        let all = api.list(ResourceKind::Pod, &ListParams::default()).await.unwrap();
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.resource_version, "2");

        let on_n1 = api
            .list(ResourceKind::Pod, &ListParams::default().fields("spec.nodeName=n1"))
            .await
            .unwrap();
        assert_eq!(on_n1.items.len(), 1);
        assert_eq!(on_n1.items[0].name(), "a");
    }

    #[tokio::test]
    async fn test_watch_resumes_from_resource_version() {
        let api = MemoryResourceApi::new();
        api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap();
        let list = api.list(ResourceKind::Pod, &ListParams::default()).await.unwrap();
        api.create(ResourceKind::Pod, &pod("b", "n1")).await.unwrap();

        let mut stream = api
            .watch(ResourceKind::Pod, &ListParams::default(), &list.resource_version)
            .await
            .unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.event_type, WatchEventType::Added);
        assert_eq!(first.object.name(), "b");

        api.delete(ResourceKind::Pod, Some("ns1"), "a").await.unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.event_type, WatchEventType::Deleted);
        assert_eq!(second.object.name(), "a");

        api.close_watches();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_hooks() {
        let api = MemoryResourceApi::new();
        api.set_unsupported(ResourceKind::Lease, true);
        let err = api.list(ResourceKind::Lease, &ListParams::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::Unsupported { .. })));

        let created = api.create(ResourceKind::Pod, &pod("a", "n1")).await.unwrap();
        api.inject_conflicts(1);
        assert!(api.replace(ResourceKind::Pod, &created).await.unwrap_err().is_conflict());
        assert!(api.replace(ResourceKind::Pod, &created).await.is_ok());

        api.set_failing(true);
        let err = api.get(ResourceKind::Pod, Some("ns1"), "a").await.unwrap_err();
        assert!(matches!(err, AppError::Api(ref e) if e.is_transient()));
    }
}
