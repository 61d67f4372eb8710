//! Builds upstream report envelopes from the local store.

use edgehold_types::{
    ReportBody, ReportEnvelope, ResourceKind, ResourceObject, WatchEvent, WatchEventType,
};
use std::sync::Arc;

use crate::reconciler::{CLUSTER_ID_LABEL, EDGE_VERSION_LABEL};
use crate::store::LocalStore;

pub struct ReportBuilder {
    cluster_id: String,
    store: Arc<LocalStore>,
}

impl ReportBuilder {
    pub fn new(cluster_id: impl Into<String>, store: Arc<LocalStore>) -> Self {
        Self { cluster_id: cluster_id.into(), store }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Copy of `obj` labelled with its local resourceVersion as the edge version.
    /// Objects without a resourceVersion go out unlabelled.
    pub fn versioned(obj: &ResourceObject) -> ResourceObject {
        let mut copy = obj.clone();
        if let Some(rv) = obj.resource_version() {
            let rv = rv.to_string();
            copy.set_label(EDGE_VERSION_LABEL, &rv);
        }
        copy
    }

    /// Central copies carry a cluster-id label; reporting them would mirror the mirror.
    fn is_mirrored(obj: &ResourceObject) -> bool {
        obj.label(CLUSTER_ID_LABEL).is_some()
    }

    /// Every locally owned object of `kind` plus the complete key inventory.
    pub fn full_report(&self, kind: ResourceKind) -> ReportEnvelope {
        let objects: Vec<ResourceObject> =
            self.store.list_kind(kind).into_iter().filter(|obj| !Self::is_mirrored(obj)).collect();
        let mut body = ReportBody::default();
        let mut keys = Vec::with_capacity(objects.len());
        for obj in &objects {
            keys.push(obj.key());
            body.update_map.insert(obj.key(), Self::versioned(obj).into_value());
        }
        keys.sort();
        body.full_list = Some(keys);
        ReportEnvelope::new(self.cluster_id.clone(), kind, body)
    }

    /// Incremental report from watch events. The last event per key wins.
    pub fn from_events(&self, kind: ResourceKind, events: &[WatchEvent]) -> ReportEnvelope {
        let mut body = ReportBody::default();
        for event in events.iter().filter(|event| !Self::is_mirrored(&event.object)) {
            let key = event.object.key();
            match event.event_type {
                WatchEventType::Added | WatchEventType::Modified => {
                    body.del_map.remove(&key);
                    body.update_map.insert(key, Self::versioned(&event.object).into_value());
                },
                WatchEventType::Deleted => {
                    body.update_map.remove(&key);
                    body.del_map.insert(key, event.object.clone().into_value());
                },
            }
        }
        ReportEnvelope::new(self.cluster_id.clone(), kind, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(name: &str, rv: &str) -> ResourceObject {
        let mut obj = ResourceObject::new(ResourceKind::Pod, Some("ns1"), name);
        obj.set_resource_version(Some(rv));
        obj
    }

    #[test]
    fn test_full_report_lists_every_key() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        store.upsert(ResourceKind::Pod, &pod("b", "9")).unwrap();
        store.upsert(ResourceKind::Pod, &pod("a", "4")).unwrap();

        let envelope = ReportBuilder::new("cluster1", store).full_report(ResourceKind::Pod);
        assert_eq!(envelope.header.source_cluster, "cluster1");
        let body = &envelope.body;
        assert_eq!(body.full_list.as_deref(), Some(&["ns1/a".to_string(), "ns1/b".to_string()][..]));
        assert_eq!(body.update_map["ns1/b"]["metadata"]["labels"][EDGE_VERSION_LABEL], "9");
    }

    #[test]
    fn test_events_collapse_per_key() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let builder = ReportBuilder::new("cluster1", store);
        let events = vec![
            WatchEvent::added(pod("a", "1")),
            WatchEvent::modified(pod("a", "2")),
            WatchEvent::added(pod("b", "3")),
            WatchEvent::deleted(pod("b", "4")),
        ];

        let envelope = builder.from_events(ResourceKind::Pod, &events);
        let body = &envelope.body;
        assert_eq!(body.update_map.len(), 1);
        assert_eq!(body.update_map["ns1/a"]["metadata"]["labels"][EDGE_VERSION_LABEL], "2");
        assert!(body.del_map.contains_key("ns1/b"));
        assert!(body.full_list.is_none());
    }

    #[test]
    fn test_central_copies_are_not_reported() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        store.upsert(ResourceKind::Pod, &pod("a", "4")).unwrap();
        let mut mirrored = pod("a-cluster1", "5");
        mirrored.set_label(CLUSTER_ID_LABEL, "cluster1");
        store.upsert(ResourceKind::Pod, &mirrored).unwrap();

        let builder = ReportBuilder::new("cluster1", store);
        let full = builder.full_report(ResourceKind::Pod);
        assert_eq!(full.body.full_list.as_deref(), Some(&["ns1/a".to_string()][..]));
        assert_eq!(full.body.update_map.len(), 1);

        let events = vec![WatchEvent::modified(mirrored.clone()), WatchEvent::deleted(mirrored)];
        let incremental = builder.from_events(ResourceKind::Pod, &events);
        assert!(incremental.body.update_map.is_empty());
        assert!(incremental.body.del_map.is_empty());
    }

    #[test]
    fn test_unversioned_objects_stay_unlabelled() {
        let obj = ResourceObject::new(ResourceKind::ConfigMap, Some("ns1"), "local");
        assert_eq!(ReportBuilder::versioned(&obj).label(EDGE_VERSION_LABEL), None);
    }
}
