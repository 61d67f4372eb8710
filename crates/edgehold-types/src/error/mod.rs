//! Typed error definitions for edgehold.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants

mod api;
mod config;
mod object;
mod store;

pub use api::ApiError;
pub use config::ConfigError;
pub use object::ObjectError;
pub use store::StoreError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps an API server error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Wraps a local store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Wraps a malformed-object error
    #[error("Object error: {0}")]
    Object(#[from] ObjectError),

    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = TypedError::Store(StoreError::UnknownKind { kind: "Widget".to_string() });

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Store"));
        assert!(json.contains("Widget"));

        let deserialized: TypedError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Conflict { kind: "Pod".to_string(), name: "web-0".to_string() };

        let msg = format!("{}", err);
        assert!(msg.contains("Pod"));
        assert!(msg.contains("web-0"));
    }
}
