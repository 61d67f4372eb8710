//! Untyped resource object.
//!
//! A [`ResourceObject`] is the JSON document exchanged with the API server, validated once
//! on construction (must be a JSON object with `metadata.name`). The accessors form the
//! small capability interface every kind shares: key, kind, resourceVersion, UID, labels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::kind::ResourceKind;
use crate::error::ObjectError;

/// Store key of an object: `namespace/name` for namespaced objects, `name` otherwise.
pub fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    }
}

/// Inverse of [`object_key`].
pub fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, key),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ResourceObject(Value);

impl TryFrom<Value> for ResourceObject {
    type Error = ObjectError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(ObjectError::NotAnObject);
        }
        let has_name = value
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .is_some_and(|n| !n.is_empty());
        if !has_name {
            return Err(ObjectError::MissingName);
        }
        Ok(Self(value))
    }
}

impl From<ResourceObject> for Value {
    fn from(obj: ResourceObject) -> Self {
        obj.0
    }
}

impl ResourceObject {
    /// Minimal object with type meta and name/namespace set.
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::String(name.to_string()));
        if let Some(ns) = namespace {
            metadata.insert("namespace".to_string(), Value::String(ns.to_string()));
        }
        let mut root = Map::new();
        root.insert("apiVersion".to_string(), Value::String(kind.descriptor().api_version()));
        root.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
        root.insert("metadata".to_string(), Value::Object(metadata));
        Self(Value::Object(root))
    }

    pub fn from_json(raw: &str) -> Result<Self, ObjectError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| ObjectError::NotAnObject)?;
        Self::try_from(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn meta_str(&self, field: &str) -> Option<&str> {
        self.0.get("metadata")?.get(field)?.as_str().filter(|s| !s.is_empty())
    }

    fn metadata_mut(&mut self) -> Option<&mut Map<String, Value>> {
        let root = self.0.as_object_mut()?;
        let meta = root.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        meta.as_object_mut()
    }

    fn set_meta(&mut self, field: &str, value: Option<&str>) {
        let Some(meta) = self.metadata_mut() else {
            return;
        };
        match value {
            Some(v) => {
                meta.insert(field.to_string(), Value::String(v.to_string()));
            },
            None => {
                meta.remove(field);
            },
        }
    }

    pub fn name(&self) -> &str {
        self.meta_str("name").unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta_str("namespace")
    }

    pub fn key(&self) -> String {
        object_key(self.namespace(), self.name())
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.meta_str("resourceVersion")
    }

    pub fn uid(&self) -> Option<&str> {
        self.meta_str("uid")
    }

    /// The `kind` field as carried by the document (informers strip it).
    pub fn type_kind(&self) -> Option<&str> {
        self.0.get("kind")?.as_str()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.0
            .pointer("/metadata/labels")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0.pointer("/metadata/labels")?.get(key)?.as_str()
    }

    pub fn set_label(&mut self, key: &str, value: &str) {
        let Some(meta) = self.metadata_mut() else {
            return;
        };
        let labels = meta.entry("labels").or_insert_with(|| Value::Object(Map::new()));
        if !labels.is_object() {
            *labels = Value::Object(Map::new());
        }
        if let Value::Object(labels) = labels {
            labels.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.set_meta("name", Some(name));
    }

    pub fn set_namespace(&mut self, namespace: Option<&str>) {
        self.set_meta("namespace", namespace);
    }

    pub fn set_resource_version(&mut self, rv: Option<&str>) {
        self.set_meta("resourceVersion", rv);
    }

    pub fn set_uid(&mut self, uid: Option<&str>) {
        self.set_meta("uid", uid);
    }

    /// Informer caches drop `apiVersion`/`kind`; put them back.
    pub fn stamp_type_meta(&mut self, kind: ResourceKind) {
        if let Value::Object(root) = &mut self.0 {
            root.insert("apiVersion".to_string(), Value::String(kind.descriptor().api_version()));
            root.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
        }
    }

    pub fn status(&self) -> Option<&Value> {
        self.0.get("status")
    }

    pub fn set_status(&mut self, status: Option<Value>) {
        if let Value::Object(root) = &mut self.0 {
            match status {
                Some(s) => {
                    root.insert("status".to_string(), s);
                },
                None => {
                    root.remove("status");
                },
            }
        }
    }

    pub fn without_status(&self) -> Self {
        let mut copy = self.clone();
        copy.set_status(None);
        copy
    }

    /// String value at a dotted field path, e.g. `spec.nodeName`.
    pub fn field_str(&self, path: &str) -> Option<&str> {
        path.split('.').try_fold(&self.0, |v, segment| v.get(segment))?.as_str()
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_documents_without_name() {
        assert_eq!(ResourceObject::try_from(json!([1, 2])), Err(ObjectError::NotAnObject));
        assert_eq!(
            ResourceObject::try_from(json!({"metadata": {"namespace": "a"}})),
            Err(ObjectError::MissingName)
        );
        assert!(serde_json::from_value::<ResourceObject>(json!({"metadata": {}})).is_err());
    }

    #[test]
    fn test_key_and_metadata_accessors() {
        let obj = ResourceObject::try_from(json!({
            "metadata": {
                "name": "web-0",
                "namespace": "shop",
                "resourceVersion": "42",
                "uid": "u-1",
                "labels": {"app": "web"}
            },
            "spec": {"nodeName": "edge-1"}
        }))
        .unwrap();

        assert_eq!(obj.key(), "shop/web-0");
        assert_eq!(obj.resource_version(), Some("42"));
        assert_eq!(obj.uid(), Some("u-1"));
        assert_eq!(obj.label("app"), Some("web"));
        assert_eq!(obj.field_str("spec.nodeName"), Some("edge-1"));
        assert_eq!(obj.type_kind(), None);
    }

    #[test]
    fn test_cluster_scoped_key() {
        let obj = ResourceObject::new(ResourceKind::Node, None, "edge-1");
        assert_eq!(obj.key(), "edge-1");
        assert_eq!(split_key("edge-1"), (None, "edge-1"));
        assert_eq!(split_key("ns1/pod1"), (Some("ns1"), "pod1"));
    }

    #[test]
    fn test_mutators() {
        let mut obj = ResourceObject::new(ResourceKind::Pod, Some("ns1"), "pod1");
        obj.set_resource_version(Some("7"));
        obj.set_label("tier", "edge");
        obj.set_status(Some(json!({"phase": "Running"})));
        assert_eq!(obj.resource_version(), Some("7"));
        assert_eq!(obj.labels().get("tier").map(String::as_str), Some("edge"));

        obj.set_resource_version(None);
        assert_eq!(obj.resource_version(), None);
        assert!(obj.without_status().status().is_none());
        assert_eq!(obj.type_kind(), Some("Pod"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let obj = ResourceObject::new(ResourceKind::ConfigMap, Some("ns"), "cfg");
        let raw = serde_json::to_string(&obj).unwrap();
        assert!(raw.starts_with('{'));
        assert_eq!(ResourceObject::from_json(&raw).unwrap(), obj);
    }
}
