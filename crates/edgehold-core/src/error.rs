//! Unified error types for edgehold Core.

use edgehold_types::{ApiError, ConfigError, ObjectError, StoreError};
use serde::Serialize;
use thiserror::Error;

/// Main error type for all edgehold operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Local store database operation failed (SQLite).
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Network request failed (HTTP client).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system or socket I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API server rejected or failed a request.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local store lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Document is not a usable resource object.
    #[error(transparent)]
    Object(#[from] ObjectError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No central backend could be reached.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Attaching the resource syncer failed.
    #[error("Sync error: {0}")]
    Sync(String),

    /// Applying an edge report failed.
    #[error("Reconcile error: {0}")]
    Reconcile(String),

    /// Report envelope is well-formed JSON but cannot be attributed or applied.
    #[error("Invalid report: {0}")]
    InvalidReport(String),
}

impl AppError {
    /// Not-found from either the API server or the local store.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api(e) => e.is_not_found(),
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_conflict())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for edgehold operations.
pub type AppResult<T> = Result<T, AppError>;
