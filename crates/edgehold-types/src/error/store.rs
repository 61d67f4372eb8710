//! Local state store errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the edge-local store.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum StoreError {
    /// Kind has no in-memory index (never registered or unknown name)
    #[error("resource kind \"{kind}\" is not known to the local store")]
    UnknownKind { kind: String },

    /// Kind is known but the key is absent
    #[error("{kind} \"{key}\" not found in the local store")]
    NotFound { kind: String, key: String },

    /// A persisted row could not be deserialized
    #[error("persisted row \"{key}\" is corrupted: {message}")]
    Corrupted { key: String, message: String },
}

impl StoreError {
    /// Both "unknown kind" and "missing key" read as not-found to callers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownKind { .. } | Self::NotFound { .. })
    }
}
