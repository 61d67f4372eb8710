//! Core domain models for edgehold.
//!
//! This module contains all shared data structures used by the edge agent and the
//! central reconciler.

mod config;
mod event;
mod kind;
mod object;
mod report;

// Re-export all models
pub use config::{AppConfig, CentralConfig, EdgeConfig, LogConfig};
pub use event::{WatchEvent, WatchEventType};
pub use kind::{KindDescriptor, ResourceKind, WatchScope};
pub use object::{object_key, split_key, ResourceObject};
pub use report::{ReportBody, ReportCommand, ReportEnvelope, ReportHeader, ReportSummary};
