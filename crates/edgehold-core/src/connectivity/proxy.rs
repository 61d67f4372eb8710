//! Local TCP endpoint piping bytes to the elected backend.

use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::ConnectivityMonitor;

impl ConnectivityMonitor {
    /// Accept connections on `listener` until the monitor is stopped.
    pub fn start_proxy_task(self: &Arc<Self>, listener: TcpListener) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if let Ok(addr) = listener.local_addr() {
                tracing::info!(%addr, "Proxy listening");
            }
            loop {
                let accepted = tokio::select! {
                    accepted = listener.accept() => accepted,
                    _ = shutdown_rx.changed() => break,
                };
                match accepted {
                    Ok((client, peer)) => {
                        let monitor = Arc::clone(&monitor);
                        tokio::spawn(async move {
                            tracing::debug!(%peer, "Proxy connection accepted");
                            monitor.proxy_connection(client).await;
                        });
                    },
                    Err(e) => tracing::warn!("Proxy accept failed: {}", e),
                }
            }
            tracing::info!("Proxy listener shutting down");
        })
    }

    /// Pipe one client connection to a backend until both directions reach EOF, either side
    /// fails, or the connection is closed from the backend set. A half-close is forwarded.
    async fn proxy_connection(&self, mut client: TcpStream) {
        let (backend_addr, mut backend) = match self.connect_backend().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!("Dropping proxy connection: {}", e);
                return;
            },
        };

        let id = self.next_connection_id();
        let (close_tx, mut close_rx) = watch::channel(false);
        self.backends.write().add_connection(&backend_addr, id, close_tx);

        tokio::select! {
            result = tokio::io::copy_bidirectional(&mut client, &mut backend) => match result {
                Ok((up, down)) => {
                    tracing::debug!(backend = %backend_addr, id, up, down, "Proxy connection finished");
                },
                Err(e) => tracing::debug!(backend = %backend_addr, id, "Proxy connection failed: {}", e),
            },
            _ = close_rx.changed() => {
                tracing::debug!(backend = %backend_addr, id, "Connection closed by backend set");
            }
        }

        drop((client, backend));
        self.backends.write().remove_connection(&backend_addr, id);
    }
}
