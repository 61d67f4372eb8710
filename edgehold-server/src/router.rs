use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::{CentralState, EdgeState};

pub fn build_edge_router(state: EdgeState) -> Router {
    Router::new()
        .nest("/api", api::edge_router())
        .route("/healthz", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub fn build_central_router(state: CentralState) -> Router {
    Router::new()
        .nest("/api", api::central_router())
        .route("/healthz", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}
