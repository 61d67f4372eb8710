//! HTTP handlers.
//!
//! Edge: generic resource dispatch over the local store, watch streaming and status.
//! Central: report intake.

pub mod reports;
pub mod resources;
pub mod status;
pub mod watch;

#[cfg(test)]
mod reports_tests;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::state::{CentralState, EdgeState};
use edgehold_core::AppError;
use edgehold_types::ResourceKind;

pub fn edge_router() -> Router<EdgeState> {
    Router::new()
        .route("/v1/resources/:kind", get(resources::list_or_watch))
        .route(
            "/v1/resources/:kind/*key",
            get(resources::get_resource)
                .put(resources::put_resource)
                .delete(resources::delete_resource),
        )
        .route("/report/:kind", get(reports::get_report))
        .route("/status", get(status::get_status))
}

pub fn central_router() -> Router<CentralState> {
    Router::new().route("/reports", post(reports::post_report))
}

pub(crate) type ApiResult<T> = Result<T, (StatusCode, String)>;

pub(crate) fn parse_kind(raw: &str) -> ApiResult<ResourceKind> {
    raw.parse::<ResourceKind>()
        .map_err(|_| (StatusCode::NOT_FOUND, format!("unknown resource kind: {raw}")))
}

pub(crate) fn error_response(e: AppError) -> (StatusCode, String) {
    let status = match &e {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        AppError::Json(_) | AppError::Object(_) | AppError::InvalidReport(_) => {
            StatusCode::BAD_REQUEST
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
