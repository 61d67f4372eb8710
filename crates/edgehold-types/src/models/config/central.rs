//! Central reconciler configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    /// Base URL of the shared central API server
    pub api_server_url: String,
    /// Address the report intake listens on
    pub listen_addr: String,
    /// Attempts per object before a resourceVersion conflict fails the item
    pub conflict_retries: u32,
    pub bearer_token: Option<String>,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            api_server_url: "https://127.0.0.1:6443".to_string(),
            listen_addr: "0.0.0.0:8470".to_string(),
            conflict_retries: 5,
            bearer_token: None,
        }
    }
}
