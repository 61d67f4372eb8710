//! Backend discovery from the central `default/kubernetes` Endpoints object.

use edgehold_types::{ResourceKind, ResourceObject, WatchEventType};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;

use super::ConnectivityMonitor;
use crate::error::AppResult;
use crate::kube::{ListParams, ResourceApi};

const ENDPOINTS_NAMESPACE: &str = "default";
const ENDPOINTS_NAME: &str = "kubernetes";

/// `ip:port` pairs of an Endpoints object. Uses the port named `https`, else the first one.
pub fn endpoint_addresses(endpoints: &ResourceObject) -> Vec<String> {
    let Some(subsets) = endpoints.as_value().get("subsets").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut addresses = Vec::new();
    for subset in subsets {
        let ports = subset.get("ports").and_then(Value::as_array);
        let port = ports
            .and_then(|ports| {
                ports
                    .iter()
                    .find(|p| p.get("name").and_then(Value::as_str) == Some("https"))
                    .or_else(|| ports.first())
            })
            .and_then(|p| p.get("port"))
            .and_then(Value::as_u64);
        let Some(port) = port else {
            continue;
        };
        let ips = subset.get("addresses").and_then(Value::as_array).into_iter().flatten();
        for ip in ips.filter_map(|a| a.get("ip").and_then(Value::as_str)) {
            addresses.push(format!("{ip}:{port}"));
        }
    }
    addresses
}

impl ConnectivityMonitor {
    /// Follow the Endpoints object, retrying every `discovery_retry` on failure.
    pub fn start_discovery_task(
        self: &Arc<Self>,
        api: Arc<dyn ResourceApi>,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = monitor.follow_endpoints(api.as_ref()) => {
                        if let Err(e) = result {
                            tracing::warn!("Backend discovery failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }

                tokio::select! {
                    () = tokio::time::sleep(monitor.config.discovery_retry) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!("Backend discovery shutting down");
        })
    }

    /// List then watch the Endpoints object, updating the server list on every change.
    /// Returns when the watch ends.
    async fn follow_endpoints(&self, api: &dyn ResourceApi) -> AppResult<()> {
        let params = ListParams::default().fields(format!(
            "metadata.namespace={ENDPOINTS_NAMESPACE},metadata.name={ENDPOINTS_NAME}"
        ));
        let list = api.list(ResourceKind::Endpoints, &params).await?;
        if let Some(endpoints) = list.items.first() {
            self.update_servers(&endpoint_addresses(endpoints));
        }

        let mut events = api.watch(ResourceKind::Endpoints, &params, &list.resource_version).await?;
        while let Some(event) = events.next().await {
            let event = event?;
            match event.event_type {
                WatchEventType::Added | WatchEventType::Modified => {
                    self.update_servers(&endpoint_addresses(&event.object));
                },
                // Only the fallback is left to try.
                WatchEventType::Deleted => self.update_servers(&[]),
            }
        }
        tracing::debug!("Endpoints watch ended");
        Ok(())
    }
}
