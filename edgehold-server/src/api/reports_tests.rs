use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::Json;
use serde_json::json;
use tower::ServiceExt;

use super::reports::post_report;
use crate::router::build_central_router;
use crate::test_helpers::{test_central_state, TEST_CLUSTER};
use edgehold_core::kube::ResourceApi;
use edgehold_core::reconciler::EDGE_VERSION_LABEL;
use edgehold_types::{ReportBody, ReportEnvelope, ResourceKind};

fn report(edge_version: &str) -> Bytes {
    report_from(TEST_CLUSTER, edge_version)
}

fn report_from(cluster: &str, edge_version: &str) -> Bytes {
    let mut body = ReportBody::default();
    body.update_map.insert(
        "ns1/cfg".to_string(),
        json!({
            "metadata": {"name": "cfg", "namespace": "ns1", "labels": {EDGE_VERSION_LABEL: edge_version}},
            "data": {"v": edge_version}
        }),
    );
    body.full_list = Some(vec!["ns1/cfg".to_string()]);
    let envelope = ReportEnvelope::new(cluster, ResourceKind::ConfigMap, body);
    Bytes::from(serde_json::to_vec(&envelope).unwrap())
}

#[tokio::test]
async fn test_post_report_applies_and_summarizes() {
    let (state, api) = test_central_state();
    let Json(summary) = post_report(State(state.clone()), report("3")).await.unwrap();
    assert_eq!(summary.created, 1);

    let Json(summary) = post_report(State(state), report("3")).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.created, 0);
    assert!(api.get(ResourceKind::ConfigMap, Some("ns1"), "cfg-cluster1").await.is_ok());
}

#[tokio::test]
async fn test_malformed_report_is_bad_request() {
    let (state, api) = test_central_state();
    let (status, _) = post_report(State(state), Bytes::from_static(b"{\"header\":"))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(api.object_count(ResourceKind::ConfigMap), 0);
}

#[tokio::test]
async fn test_report_without_cluster_is_bad_request() {
    let (state, api) = test_central_state();
    let (status, message) = post_report(State(state), report_from(" ", "1")).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message.contains("sourceCluster"));
    assert_eq!(api.object_count(ResourceKind::ConfigMap), 0);
}

#[tokio::test]
async fn test_central_router_accepts_reports() {
    let (state, api) = test_central_state();
    let app = build_central_router(state);
    let request = Request::builder()
        .method("POST")
        .uri("/api/reports")
        .body(Body::from(report("1")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(api.object_count(ResourceKind::ConfigMap), 1);
}
