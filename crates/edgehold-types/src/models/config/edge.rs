//! Edge agent configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Directory holding the local SQLite store
    pub data_dir: PathBuf,
    /// Name of the node this agent runs on (node-scoped informers)
    pub node_name: String,
    /// Identity of this edge cluster, stamped on upstream reports
    pub cluster_id: String,
    /// Base URL the syncer uses to reach the central API (normally the local proxy)
    pub api_server_url: String,
    /// Local TCP endpoint that proxies to the elected central backend
    pub proxy_listen_addr: String,
    /// Backend that is always a candidate, even if discovery never returns it
    pub fallback_server: String,
    /// Local HTTP surface for workloads (resource dispatch + watch)
    pub http_listen_addr: String,
    pub health_check_interval_secs: u64,
    pub dial_timeout_secs: u64,
    pub discovery_retry_secs: u64,
    pub cache_sync_timeout_secs: u64,
    pub resync_period_secs: u64,
    pub attach_retry_secs: u64,
    /// Per-watcher event buffer before a slow watcher is evicted
    pub watch_buffer: usize,
    pub bearer_token: Option<String>,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/edgehold"),
            node_name: "edge-node".to_string(),
            cluster_id: "edge-cluster".to_string(),
            api_server_url: "https://127.0.0.1:6443".to_string(),
            proxy_listen_addr: "127.0.0.1:6443".to_string(),
            fallback_server: "10.0.0.1:6443".to_string(),
            http_listen_addr: "127.0.0.1:10550".to_string(),
            health_check_interval_secs: 2,
            dial_timeout_secs: 10,
            discovery_retry_secs: 5,
            cache_sync_timeout_secs: 60,
            resync_period_secs: 300,
            attach_retry_secs: 5,
            watch_buffer: 256,
            bearer_token: None,
        }
    }
}

impl EdgeConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn discovery_retry(&self) -> Duration {
        Duration::from_secs(self.discovery_retry_secs)
    }

    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_sync_timeout_secs)
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    pub fn attach_retry(&self) -> Duration {
        Duration::from_secs(self.attach_retry_secs)
    }
}
