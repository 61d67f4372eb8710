use axum::{extract::State, Json};
use edgehold_core::connectivity::BackendStatus;
use edgehold_core::edge::ConnectionState;
use edgehold_core::store::StoreMode;
use serde::Serialize;

use crate::state::EdgeState;

#[derive(Debug, Serialize)]
pub struct EdgeStatus {
    pub mode: StoreMode,
    pub connection: ConnectionState,
    pub remote_ready: bool,
    pub backends: BackendStatus,
}

pub async fn get_status(State(state): State<EdgeState>) -> Json<EdgeStatus> {
    let inner = &state.inner;
    Json(EdgeStatus {
        mode: state.store().mode(),
        connection: inner.agent.state(),
        remote_ready: inner.monitor.is_remote_ready(),
        backends: inner.monitor.status(),
    })
}
