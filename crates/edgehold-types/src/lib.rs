//! # edgehold Types
//!
//! Core types, models, and error definitions for edgehold.
//!
//! This crate provides the foundational type system shared by the edge agent and the
//! central reconciler:
//!
//! - **`error`** - Typed error hierarchy for the API client, local store, and configuration
//! - **`models`** - Resource kinds and objects, watch events, report envelopes, config
//!
//! ## Architecture Role
//!
//! `edgehold-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!            edgehold-types (this crate)
//!                      │
//!                      ▼
//!                edgehold-core
//!                      │
//!                      ▼
//!               edgehold-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for the HTTP surface and the persisted row format
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ApiError, ConfigError, ObjectError, Result, StoreError, TypedError};

// Re-export core model types
pub use models::{
    object_key, split_key, AppConfig, CentralConfig, EdgeConfig, KindDescriptor, LogConfig,
    ReportBody, ReportCommand, ReportEnvelope, ReportHeader, ReportSummary, ResourceKind,
    ResourceObject, WatchEvent, WatchEventType, WatchScope,
};
