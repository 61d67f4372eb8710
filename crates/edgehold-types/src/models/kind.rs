//! Resource kind catalog.
//!
//! Every kind the edge mirrors is a variant of [`ResourceKind`]; everything that differs
//! between kinds (REST path, scope, status subresource, capability probe) lives in a
//! static [`KindDescriptor`] so the syncer and reconciler can stay kind-agnostic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Closed set of resource kinds mirrored between edge and center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    Node,
    Service,
    Endpoints,
    EndpointSlice,
    ConfigMap,
    Secret,
    Namespace,
    PersistentVolume,
    PersistentVolumeClaim,
    StorageClass,
    Lease,
}

/// Which informer factory a kind is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchScope {
    /// Every object of the kind, cluster-wide
    Cluster,
    /// Only objects bound to this node (field selector)
    ThisNode,
}

/// Static per-kind facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    pub kind: ResourceKind,
    /// API group, empty for the core group
    pub group: &'static str,
    pub version: &'static str,
    /// Lower-case plural used in REST paths
    pub plural: &'static str,
    pub namespaced: bool,
    /// Whether `status` is a separate subresource
    pub has_status: bool,
    pub scope: WatchScope,
    /// Registered only if a list call succeeds against the central API
    pub needs_probe: bool,
}

const fn core(
    kind: ResourceKind,
    plural: &'static str,
    namespaced: bool,
    has_status: bool,
    scope: WatchScope,
) -> KindDescriptor {
    KindDescriptor { kind, group: "", version: "v1", plural, namespaced, has_status, scope, needs_probe: false }
}

const fn grouped(
    kind: ResourceKind,
    group: &'static str,
    plural: &'static str,
    namespaced: bool,
) -> KindDescriptor {
    KindDescriptor {
        kind,
        group,
        version: "v1",
        plural,
        namespaced,
        has_status: false,
        scope: WatchScope::Cluster,
        needs_probe: true,
    }
}

static POD: KindDescriptor = core(ResourceKind::Pod, "pods", true, true, WatchScope::ThisNode);
static NODE: KindDescriptor = core(ResourceKind::Node, "nodes", false, true, WatchScope::ThisNode);
static SERVICE: KindDescriptor =
    core(ResourceKind::Service, "services", true, true, WatchScope::Cluster);
static ENDPOINTS: KindDescriptor =
    core(ResourceKind::Endpoints, "endpoints", true, false, WatchScope::Cluster);
static ENDPOINT_SLICE: KindDescriptor =
    grouped(ResourceKind::EndpointSlice, "discovery.k8s.io", "endpointslices", true);
static CONFIG_MAP: KindDescriptor =
    core(ResourceKind::ConfigMap, "configmaps", true, false, WatchScope::Cluster);
static SECRET: KindDescriptor = core(ResourceKind::Secret, "secrets", true, false, WatchScope::Cluster);
static NAMESPACE: KindDescriptor =
    core(ResourceKind::Namespace, "namespaces", false, true, WatchScope::Cluster);
static PERSISTENT_VOLUME: KindDescriptor =
    core(ResourceKind::PersistentVolume, "persistentvolumes", false, true, WatchScope::Cluster);
static PERSISTENT_VOLUME_CLAIM: KindDescriptor = core(
    ResourceKind::PersistentVolumeClaim,
    "persistentvolumeclaims",
    true,
    true,
    WatchScope::Cluster,
);
static STORAGE_CLASS: KindDescriptor =
    grouped(ResourceKind::StorageClass, "storage.k8s.io", "storageclasses", false);
static LEASE: KindDescriptor = grouped(ResourceKind::Lease, "coordination.k8s.io", "leases", true);

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::Pod,
        ResourceKind::Node,
        ResourceKind::Service,
        ResourceKind::Endpoints,
        ResourceKind::EndpointSlice,
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
        ResourceKind::Namespace,
        ResourceKind::PersistentVolume,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::StorageClass,
        ResourceKind::Lease,
    ];

    pub fn descriptor(self) -> &'static KindDescriptor {
        match self {
            Self::Pod => &POD,
            Self::Node => &NODE,
            Self::Service => &SERVICE,
            Self::Endpoints => &ENDPOINTS,
            Self::EndpointSlice => &ENDPOINT_SLICE,
            Self::ConfigMap => &CONFIG_MAP,
            Self::Secret => &SECRET,
            Self::Namespace => &NAMESPACE,
            Self::PersistentVolume => &PERSISTENT_VOLUME,
            Self::PersistentVolumeClaim => &PERSISTENT_VOLUME_CLAIM,
            Self::StorageClass => &STORAGE_CLASS,
            Self::Lease => &LEASE,
        }
    }

    /// The `kind` field value, e.g. `"ConfigMap"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Node => "Node",
            Self::Service => "Service",
            Self::Endpoints => "Endpoints",
            Self::EndpointSlice => "EndpointSlice",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Namespace => "Namespace",
            Self::PersistentVolume => "PersistentVolume",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::StorageClass => "StorageClass",
            Self::Lease => "Lease",
        }
    }
}

impl KindDescriptor {
    /// The `apiVersion` field value, e.g. `"v1"` or `"discovery.k8s.io/v1"`.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Field selector restricting a node-scoped informer to this node.
    pub fn node_field_selector(&self, node_name: &str) -> Option<String> {
        match (self.scope, self.kind) {
            (WatchScope::ThisNode, ResourceKind::Pod) => Some(format!("spec.nodeName={node_name}")),
            (WatchScope::ThisNode, _) => Some(format!("metadata.name={node_name}")),
            (WatchScope::Cluster, _) => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = StoreError;

    /// Accepts the kind name (any case) or the REST plural.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s) || k.descriptor().plural == s)
            .ok_or_else(|| StoreError::UnknownKind { kind: s.to_string() })
    }
}
