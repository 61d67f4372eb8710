//! Edge, central, and logging configuration models.

mod app;
mod central;
mod edge;

pub use app::{AppConfig, LogConfig};
pub use central::CentralConfig;
pub use edge::EdgeConfig;
