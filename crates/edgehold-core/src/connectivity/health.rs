//! Periodic backend health checks.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::{ConnectivityMonitor, RemoteSignal};
use crate::error::{AppError, AppResult};

/// TCP dial bounded by `timeout`.
pub(super) async fn dial(addr: &str, timeout: Duration) -> AppResult<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Connectivity(format!("dial {addr} timed out after {timeout:?}"))),
    }
}

impl ConnectivityMonitor {
    /// Start the fixed-interval health loop. The first check runs immediately.
    pub fn start_health_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                monitor.check_health().await;

                tokio::select! {
                    () = tokio::time::sleep(monitor.config.health_check_interval) => {}
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Backend health loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Dial every backend once, update the marks, and emit a signal on a transition.
    ///
    /// Returns the signal that was emitted, if any.
    pub async fn check_health(&self) -> Option<RemoteSignal> {
        let servers = self.servers();
        let timeout = self.config.dial_timeout;
        let results =
            join_all(servers.iter().map(|addr| async move { (addr, dial(addr, timeout).await) }))
                .await;

        let mut any_healthy = false;
        let signal = {
            let mut backends = self.backends.write();
            for (addr, result) in results {
                match result {
                    Ok(_) => {
                        if backends.is_healthy(addr) != Some(true) {
                            tracing::info!(backend = %addr, "Backend healthy");
                        }
                        backends.mark_healthy(addr);
                        any_healthy = true;
                    },
                    Err(e) => {
                        let was = backends.is_healthy(addr);
                        let to_close = backends.mark_unhealthy(addr);
                        if was != Some(false) {
                            tracing::warn!(
                                backend = %addr,
                                closing = to_close.len(),
                                "Backend unhealthy: {}",
                                e
                            );
                        }
                        for close in to_close {
                            let _ = close.send(true);
                        }
                    },
                }
            }
            backends.update_remote_ready(any_healthy)
        };

        if let Some(signal) = signal {
            match signal {
                RemoteSignal::Ready => tracing::info!("Central API reachable"),
                RemoteSignal::NotReady => tracing::warn!("Central API unreachable"),
            }
            if self.signal_tx.send(signal).await.is_err() {
                tracing::debug!(?signal, "No consumer for remote signal");
            }
        }
        signal
    }
}
