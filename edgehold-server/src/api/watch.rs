//! Watch streaming as newline-delimited JSON.
//!
//! Each request owns a registry subscription for the lifetime of its response body. A
//! disconnecting client drops the body, which drops the subscription and unregisters it.
//! Eviction of a slow client ends the stream; the client is expected to re-list.

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use edgehold_types::ResourceKind;
use futures::Stream;

use crate::state::EdgeState;

const NDJSON: &str = "application/x-ndjson";

pub fn watch_response(state: &EdgeState, kind: ResourceKind, namespace: Option<String>) -> Response {
    let lines = event_lines(state, kind, namespace);
    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response()
}

/// Subscribes immediately; events broadcast after this returns are delivered.
pub fn event_lines(
    state: &EdgeState,
    kind: ResourceKind,
    namespace: Option<String>,
) -> impl Stream<Item = Result<String, serde_json::Error>> + Send + 'static {
    let mut subscription = state.registry().subscribe(kind);
    tracing::debug!(%kind, id = subscription.id(), ?namespace, "Watch opened");

    async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            if let Some(ns) = namespace.as_deref() {
                if event.object.namespace() != Some(ns) {
                    continue;
                }
            }
            yield serde_json::to_string(&event).map(|mut line| {
                line.push('\n');
                line
            });
        }
        tracing::debug!(%kind, "Watch stream ended");
    }
}
