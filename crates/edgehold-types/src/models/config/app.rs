//! Application-level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::central::CentralConfig;
use super::edge::EdgeConfig;

/// Full application configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub central: CentralConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Directory for daily-rolling log files (stdout only when unset)
    pub log_dir: Option<PathBuf>,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), log_dir: None, json: false }
    }
}
