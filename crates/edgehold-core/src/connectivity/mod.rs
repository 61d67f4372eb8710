//! Connectivity monitor.
//!
//! Decides whether the central API is reachable and exposes a local TCP endpoint that
//! transparently reaches it:
//!
//! - [`BackendSet`] - discovered servers plus the fallback, health marks, connection table
//! - health loop - dials every backend on a fixed interval and emits edge-triggered
//!   [`RemoteSignal`]s
//! - discovery - follows the central `default/kubernetes` Endpoints object
//! - proxy - accepts local connections and pipes them to the elected backend

mod backends;
mod discovery;
mod health;
mod proxy;

#[cfg(test)]
mod tests;

pub use backends::{BackendHealth, BackendSet, BackendStatus};
pub use discovery::endpoint_addresses;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use crate::error::{AppError, AppResult};
use edgehold_types::EdgeConfig;

const SIGNAL_BUFFER: usize = 16;

/// Attach/detach notification, sent only on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSignal {
    Ready,
    NotReady,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub fallback_server: String,
    pub health_check_interval: Duration,
    pub dial_timeout: Duration,
    pub discovery_retry: Duration,
}

impl MonitorConfig {
    pub fn from_edge(config: &EdgeConfig) -> Self {
        Self {
            fallback_server: config.fallback_server.clone(),
            health_check_interval: config.health_check_interval(),
            dial_timeout: config.dial_timeout(),
            discovery_retry: config.discovery_retry(),
        }
    }
}

pub struct ConnectivityMonitor {
    config: MonitorConfig,
    backends: RwLock<BackendSet>,
    signal_tx: mpsc::Sender<RemoteSignal>,
    shutdown_tx: watch::Sender<bool>,
    next_connection_id: AtomicU64,
}

impl ConnectivityMonitor {
    /// Create the monitor and the receiving end of its signal channel.
    /// The initial state is not-ready; the first successful health check emits `Ready`.
    pub fn new(config: MonitorConfig) -> (Arc<Self>, mpsc::Receiver<RemoteSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        let (shutdown_tx, _) = watch::channel(false);
        let monitor = Arc::new(Self {
            backends: RwLock::new(BackendSet::new(config.fallback_server.clone())),
            config,
            signal_tx,
            shutdown_tx,
            next_connection_id: AtomicU64::new(1),
        });
        (monitor, signal_rx)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Install a new discovered server list.
    pub fn update_servers(&self, discovered: &[String]) {
        let mut backends = self.backends.write();
        if backends.set_servers(discovered) {
            tracing::info!(
                servers = ?backends.servers(),
                current = backends.current().unwrap_or_default(),
                "Backend list updated"
            );
        }
    }

    pub fn servers(&self) -> Vec<String> {
        self.backends.read().servers().to_vec()
    }

    pub fn current_backend(&self) -> Option<String> {
        self.backends.read().current().map(str::to_string)
    }

    pub fn is_remote_ready(&self) -> bool {
        self.backends.read().remote_ready()
    }

    pub fn status(&self) -> BackendStatus {
        self.backends.read().status()
    }

    /// Pick a backend for a new proxied connection and dial it.
    ///
    /// Prefers `current` while it is not known to be unhealthy and dials successfully, then
    /// walks the permutation (wrapping). The first backend that answers becomes `current`.
    pub async fn connect_backend(&self) -> AppResult<(String, TcpStream)> {
        let rotation = self.backends.read().rotation();
        for (idx, addr) in rotation {
            if self.backends.read().is_healthy(&addr) == Some(false) {
                continue;
            }
            match health::dial(&addr, self.config.dial_timeout).await {
                Ok(stream) => {
                    self.backends.write().set_current(idx);
                    return Ok((addr, stream));
                },
                Err(e) => tracing::debug!(backend = %addr, "Dial failed: {}", e),
            }
        }
        Err(AppError::Connectivity("all servers failed".to_string()))
    }

    /// Address of a reachable backend, or an error when every backend fails.
    pub async fn get_available_backend(&self) -> AppResult<String> {
        self.connect_backend().await.map(|(addr, _)| addr)
    }

    /// Stop the health, discovery and proxy tasks.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}
