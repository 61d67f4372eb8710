//! Naming, labelling and the edge-version gate for centrally stored copies.

use edgehold_types::{object_key, split_key, ResourceObject};

/// Identity of the edge cluster an object was reported by.
pub const CLUSTER_ID_LABEL: &str = "edgehold.io/cluster-id";
/// The edge's local resourceVersion when the object was reported.
pub const EDGE_VERSION_LABEL: &str = "edgehold.io/edge-version";

/// Central name of an edge object: `{name}-{cluster}`.
pub fn composite_name(name: &str, cluster: &str) -> String {
    format!("{name}-{cluster}")
}

/// Inverse of [`composite_name`]. `None` if `central_name` was not made for `cluster`.
pub fn edge_name<'a>(central_name: &'a str, cluster: &str) -> Option<&'a str> {
    central_name
        .strip_suffix(cluster)?
        .strip_suffix('-')
        .filter(|name| !name.is_empty())
}

/// Edge key (`namespace/name`) of a central copy made for `cluster`.
pub fn edge_key(central: &ResourceObject, cluster: &str) -> Option<String> {
    let name = edge_name(central.name(), cluster)?;
    Some(object_key(central.namespace(), name))
}

/// `(namespace, composite name)` addressing the central copy of edge key `key`.
pub fn central_address(key: &str, cluster: &str) -> (Option<String>, String) {
    let (namespace, name) = split_key(key);
    (namespace.map(str::to_string), composite_name(name, cluster))
}

pub fn edge_version(obj: &ResourceObject) -> Option<u64> {
    obj.label(EDGE_VERSION_LABEL)?.trim().parse().ok()
}

/// Whether the spec of `incoming` may replace `stored`.
///
/// Strictly greater wins. Equal loses. An incoming object without a readable edge
/// version never wins; a stored one without it always loses.
pub fn supersedes(incoming: &ResourceObject, stored: &ResourceObject) -> bool {
    match (edge_version(incoming), edge_version(stored)) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(new), Some(old)) => new > old,
    }
}

/// Whether the status of `incoming` may replace the status of `stored`. Ties are accepted:
/// the spec write of the same report already raised the stored version to match.
pub fn status_supersedes(incoming: &ResourceObject, stored: &ResourceObject) -> bool {
    match (edge_version(incoming), edge_version(stored)) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(new), Some(old)) => new >= old,
    }
}

/// Carry the central concurrency tokens of `stored` onto `incoming`, so the write
/// targets the existing object.
pub fn adapt(incoming: &mut ResourceObject, stored: &ResourceObject) {
    incoming.set_resource_version(stored.resource_version());
    incoming.set_uid(stored.uid());
}

/// The central copy of an edge object: composite name, cluster label, edge tokens dropped.
pub fn to_central(mut obj: ResourceObject, cluster: &str) -> ResourceObject {
    let name = composite_name(obj.name(), cluster);
    obj.set_name(&name);
    obj.set_label(CLUSTER_ID_LABEL, cluster);
    obj.set_resource_version(None);
    obj.set_uid(None);
    obj
}
