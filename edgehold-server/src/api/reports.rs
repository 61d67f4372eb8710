use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use edgehold_types::{ReportEnvelope, ReportSummary};

use super::{error_response, parse_kind, ApiResult};
use crate::state::{CentralState, EdgeState};

/// Edge side: full report of one kind, for an external transport to carry upstream.
pub async fn get_report(
    State(state): State<EdgeState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<ReportEnvelope>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.inner.reports.full_report(kind)))
}

/// Central side. The raw body is taken so a malformed envelope is rejected with 400
/// before anything is written.
pub async fn post_report(
    State(state): State<CentralState>,
    body: Bytes,
) -> ApiResult<Json<ReportSummary>> {
    state.inner.reconciler.apply_json(&body).await.map(Json).map_err(error_response)
}
