//! Configuration loading and saving.
//!
//! The config file is JSON. A missing file yields defaults; environment variables
//! override the few fields that differ per deployment.

use edgehold_types::{AppConfig, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppResult;

const CONFIG_DIR: &str = "edgehold";
const CONFIG_FILE: &str = "config.json";

/// `$XDG_CONFIG_HOME/edgehold/config.json`, or `./config.json` when no config dir exists.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Load configuration from `path`, apply env overrides, and validate.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str::<AppConfig>(&content)
            .map_err(|e| ConfigError::ParseError { message: format!("{}: {}", path.display(), e) })?
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Save configuration atomically (temp file + rename).
pub fn save_config(config: &AppConfig, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&temp_path, content)
        .map_err(|e| ConfigError::WriteError { message: e.to_string() })?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError { message: e.to_string() })?;
    Ok(())
}

pub(crate) fn apply_env_overrides(config: &mut AppConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("EDGEHOLD_NODE_NAME") {
        config.edge.node_name = v;
    }
    if let Some(v) = env("EDGEHOLD_CLUSTER_ID") {
        config.edge.cluster_id = v;
    }
    if let Some(v) = env("EDGEHOLD_API_SERVER") {
        config.edge.api_server_url = v.clone();
        config.central.api_server_url = v;
    }
    if let Some(v) = env("EDGEHOLD_DATA_DIR") {
        config.edge.data_dir = PathBuf::from(v);
    }
}

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let edge = &config.edge;
    if edge.fallback_server.trim().is_empty() {
        return Err(ConfigError::invalid("edge.fallback_server", "must not be empty"));
    }
    if edge.cluster_id.trim().is_empty() {
        return Err(ConfigError::invalid("edge.cluster_id", "must not be empty"));
    }
    if edge.node_name.trim().is_empty() {
        return Err(ConfigError::invalid("edge.node_name", "must not be empty"));
    }
    if edge.health_check_interval_secs == 0 {
        return Err(ConfigError::invalid("edge.health_check_interval_secs", "must be positive"));
    }
    if edge.cache_sync_timeout_secs == 0 {
        return Err(ConfigError::invalid("edge.cache_sync_timeout_secs", "must be positive"));
    }
    if edge.resync_period_secs == 0 {
        return Err(ConfigError::invalid("edge.resync_period_secs", "must be positive"));
    }
    if edge.watch_buffer == 0 {
        return Err(ConfigError::invalid("edge.watch_buffer", "must be positive"));
    }
    if config.central.conflict_retries == 0 {
        return Err(ConfigError::invalid("central.conflict_retries", "must be at least 1"));
    }
    Ok(())
}
