//! Errors returned by a Kubernetes-compatible API server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the API server.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ApiError {
    /// Object does not exist (404)
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    /// Create collided with an existing object (409, reason AlreadyExists)
    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists { kind: String, name: String },

    /// Optimistic-concurrency conflict on resourceVersion (409, reason Conflict)
    #[error("Operation on {kind} \"{name}\" conflicts with a concurrent write")]
    Conflict { kind: String, name: String },

    /// The server does not serve this resource kind
    #[error("Resource kind {kind} is not served by the API server")]
    Unsupported { kind: String },

    /// Any other non-success status
    #[error("API server returned {code}: {message}")]
    Status { code: u16, message: String },

    /// Connection-level failure
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// Response body could not be decoded
    #[error("Failed to decode API response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Map an HTTP status plus the `reason` field of a `Status` body to a typed error.
    pub fn from_status(code: u16, reason: &str, message: String, kind: &str, name: &str) -> Self {
        match (code, reason) {
            (404, _) => Self::NotFound { kind: kind.to_string(), name: name.to_string() },
            (409, "AlreadyExists") => {
                Self::AlreadyExists { kind: kind.to_string(), name: name.to_string() }
            },
            (409, _) => Self::Conflict { kind: kind.to_string(), name: name.to_string() },
            _ => Self::Status { code, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Transient failures are retried on a fixed schedule by callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}
