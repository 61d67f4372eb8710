use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use edgehold_core::store::StoreMode;
use edgehold_types::{split_key, ResourceKind, ResourceObject, WatchEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error_response, parse_kind, watch, ApiResult};
use crate::state::EdgeState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub namespace: Option<String>,
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Serialize)]
pub struct ResourceList {
    pub items: Vec<ResourceObject>,
}

#[derive(Debug, Serialize)]
pub struct WriteResult {
    pub key: String,
    pub mode: StoreMode,
    /// Whether the write is visible to readers right away (disconnected mode only)
    pub indexed: bool,
}

pub async fn list_or_watch(
    State(state): State<EdgeState>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    if query.watch {
        let kind = parse_kind(&kind)?;
        return Ok(watch::watch_response(&state, kind, query.namespace));
    }
    Ok(list_resources(&state, &kind, query.namespace.as_deref()).into_response())
}

/// An unknown kind lists as empty.
pub fn list_resources(state: &EdgeState, kind: &str, namespace: Option<&str>) -> Json<ResourceList> {
    Json(ResourceList { items: state.store().list(kind, namespace) })
}

pub async fn get_resource(
    State(state): State<EdgeState>,
    Path((kind, key)): Path<(String, String)>,
) -> ApiResult<Json<ResourceObject>> {
    let kind = parse_kind(&kind)?;
    let key = normalize_key(&key);
    state.store().get_kind(kind, key).map(Json).map_err(error_response)
}

pub async fn put_resource(
    State(state): State<EdgeState>,
    Path((kind, key)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WriteResult>> {
    let kind = parse_kind(&kind)?;
    let key = normalize_key(&key);
    let obj = object_for_key(kind, key, body)?;

    let store = state.store();
    let existed = store.get_kind(kind, key).is_ok();
    let stamped = store.client_put(kind, &obj).map_err(error_response)?;
    let indexed = stamped.is_some();
    if let Some(obj) = stamped {
        // Nothing upstream will echo this write back, so local watchers hear it from here.
        let event = if existed { WatchEvent::modified(obj) } else { WatchEvent::added(obj) };
        state.registry().broadcast(kind, &event);
    }
    tracing::debug!(%kind, key, indexed, "Client write");

    Ok(Json(WriteResult { key: key.to_string(), mode: store.mode(), indexed }))
}

pub async fn delete_resource(
    State(state): State<EdgeState>,
    Path((kind, key)): Path<(String, String)>,
) -> ApiResult<Json<WriteResult>> {
    let kind = parse_kind(&kind)?;
    let key = normalize_key(&key);
    let store = state.store();
    let removed = store.client_delete(kind, key).map_err(error_response)?;
    let indexed = removed.is_some();
    if let Some(obj) = removed {
        state.registry().broadcast(kind, &WatchEvent::deleted(obj));
    }
    tracing::debug!(%kind, key, indexed, "Client delete");

    Ok(Json(WriteResult { key: key.to_string(), mode: store.mode(), indexed }))
}

fn normalize_key(raw: &str) -> &str {
    raw.trim_matches('/')
}

/// Parse `body` and check it is the object addressed by `key`. A missing namespace is
/// taken from the key.
fn object_for_key(kind: ResourceKind, key: &str, body: Value) -> ApiResult<ResourceObject> {
    let mut obj =
        ResourceObject::try_from(body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let (namespace, _) = split_key(key);
    if obj.namespace().is_none() {
        if let Some(ns) = namespace {
            obj.set_namespace(Some(ns));
        }
    }
    if obj.key() != key {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("object key {} does not match path key {}", obj.key(), key),
        ));
    }
    obj.stamp_type_meta(kind);
    Ok(obj)
}
