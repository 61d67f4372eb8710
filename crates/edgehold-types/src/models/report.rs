//! Upstream report envelope.
//!
//! An edge cluster reports its state to the center as one envelope per resource kind:
//!
//! ```text
//! { header:       { command, sourceCluster, selector },
//!   resourceKind: "Pod",
//!   body:         { updateMap: {key: object}, delMap: {key: object}, fullList: [key, ...] } }
//! ```
//!
//! The header is filled in by the transport; the body is built by the edge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::kind::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCommand {
    /// Apply the body to the central datastore
    Report,
    /// Liveness probe from the edge; carries no state
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeader {
    pub command: ReportCommand,
    /// Identity of the reporting edge cluster
    pub source_cluster: String,
    /// Routing selector used by the transport, opaque here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Per-kind batch. Values stay untyped so a single malformed object fails alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody {
    #[serde(default)]
    pub update_map: BTreeMap<String, Value>,
    #[serde(default)]
    pub del_map: BTreeMap<String, Value>,
    /// Complete inventory of keys; absent means "no full-list reconciliation".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEnvelope {
    pub header: ReportHeader,
    pub resource_kind: ResourceKind,
    pub body: ReportBody,
}

impl ReportEnvelope {
    pub fn new(source_cluster: impl Into<String>, kind: ResourceKind, body: ReportBody) -> Self {
        Self {
            header: ReportHeader {
                command: ReportCommand::Report,
                source_cluster: source_cluster.into(),
                selector: None,
            },
            resource_kind: kind,
            body,
        }
    }
}

/// Outcome counters of applying one envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub created: usize,
    pub updated: usize,
    /// Stale or duplicate reports rejected by the edge-version gate
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_format() {
        let raw = json!({
            "header": {"command": "report", "sourceCluster": "cluster1"},
            "resourceKind": "Pod",
            "body": {
                "updateMap": {"ns1/pod1": {"metadata": {"name": "pod1", "namespace": "ns1"}}},
                "fullList": ["ns1/pod1"]
            }
        });

        let envelope: ReportEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.resource_kind, ResourceKind::Pod);
        assert_eq!(envelope.header.source_cluster, "cluster1");
        assert_eq!(envelope.body.update_map.len(), 1);
        assert!(envelope.body.del_map.is_empty());
        assert_eq!(envelope.body.full_list.as_deref(), Some(&["ns1/pod1".to_string()][..]));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = json!({
            "header": {"command": "report", "sourceCluster": "c"},
            "resourceKind": "Widget",
            "body": {}
        });
        assert!(serde_json::from_value::<ReportEnvelope>(raw).is_err());
    }
}
