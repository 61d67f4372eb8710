//! # edgehold Core
//!
//! Edge-autonomy and multi-cluster reconciliation engine.
//!
//! ## Architecture
//!
//! ```text
//! edgehold-core/src/
//! ├── connectivity/   # backend discovery, health checks, TCP proxy, attach signal
//! ├── store/          # SQLite rows + per-kind in-memory indexes, connected/disconnected modes
//! ├── syncer/         # informers, generic kind adapter, sync session
//! ├── watch.rs        # subscriber registry (watch fan-out)
//! ├── edge/           # edge agent state machine, upstream report builder
//! ├── reconciler/     # central-side create-or-update / delete / full-list reconciliation
//! └── kube/           # Kubernetes-compatible API client (HTTP + in-memory)
//! ```
//!
//! Dependency order, leaves first: connectivity → store → syncer + watch → edge.
//! The reconciler is independent and runs on the central side.

#![allow(
    clippy::significant_drop_tightening,
    reason = "RwLock guards in async code require careful lifetime management"
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "Types like StoreMode/SyncSession read better with the prefix"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod connectivity;
pub mod edge;
pub mod error;
pub mod kube;
pub mod logger;
pub mod reconciler;
pub mod store;
pub mod syncer;
pub mod watch;

// Re-export commonly used types
pub use error::{AppError, AppResult};
