//! Candidate backend list, health marks and the proxied-connection table.
//!
//! Everything here lives behind the monitor's single `RwLock`; methods are synchronous and
//! never dial.

use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::watch;

use super::RemoteSignal;

/// Handle used to force-close one proxied connection.
pub(crate) type CloseHandle = watch::Sender<bool>;

#[derive(Debug)]
pub struct BackendSet {
    fallback: String,
    /// Deduplicated, sorted discovery result with the fallback included
    sorted: Vec<String>,
    /// Randomized permutation of `sorted` used for selection
    order: Vec<String>,
    current: usize,
    health: HashMap<String, bool>,
    connections: HashMap<String, HashMap<u64, CloseHandle>>,
    remote_ready: bool,
}

/// Per-backend view for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub address: String,
    /// `None` until the first health check
    pub healthy: Option<bool>,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub current: Option<String>,
    pub remote_ready: bool,
    pub backends: Vec<BackendHealth>,
}

impl BackendSet {
    pub fn new(fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        Self {
            sorted: vec![fallback.clone()],
            order: vec![fallback.clone()],
            fallback,
            current: 0,
            health: HashMap::new(),
            connections: HashMap::new(),
            remote_ready: false,
        }
    }

    /// Dedupe and sort `discovered`, append the fallback if missing.
    pub fn normalize(&self, discovered: &[String]) -> Vec<String> {
        let mut servers: Vec<String> = discovered
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        servers.sort();
        servers.dedup();
        if !servers.contains(&self.fallback) {
            servers.push(self.fallback.clone());
        }
        servers
    }

    /// Replace the server list. Returns `false` when the normalized list is unchanged.
    ///
    /// A change reshuffles the selection order and resets `current` to its first entry.
    /// Health marks of dropped servers are forgotten and their open connections closed.
    pub fn set_servers(&mut self, discovered: &[String]) -> bool {
        let servers = self.normalize(discovered);
        if servers == self.sorted {
            return false;
        }
        let mut order = servers.clone();
        order.shuffle(&mut rand::thread_rng());

        self.health.retain(|addr, _| servers.contains(addr));
        self.connections.retain(|addr, conns| {
            let kept = servers.contains(addr);
            if !kept {
                tracing::debug!(backend = %addr, closing = conns.len(), "Server dropped from list");
                for close in conns.values() {
                    let _ = close.send(true);
                }
            }
            kept
        });
        self.sorted = servers;
        self.order = order;
        self.current = 0;
        true
    }

    pub fn servers(&self) -> &[String] {
        &self.sorted
    }

    /// Selection order starting at `current`, wrapping once around.
    pub fn rotation(&self) -> Vec<(usize, String)> {
        let n = self.order.len();
        (0..n)
            .map(|i| {
                let idx = (self.current + i) % n;
                (idx, self.order[idx].clone())
            })
            .collect()
    }

    pub fn current(&self) -> Option<&str> {
        self.order.get(self.current).map(String::as_str)
    }

    pub fn set_current(&mut self, idx: usize) {
        if idx < self.order.len() {
            self.current = idx;
        }
    }

    pub fn is_healthy(&self, addr: &str) -> Option<bool> {
        self.health.get(addr).copied()
    }

    pub fn mark_healthy(&mut self, addr: &str) {
        self.health.insert(addr.to_string(), true);
    }

    /// Mark `addr` unhealthy and hand back the close handles of its proxied connections.
    pub(crate) fn mark_unhealthy(&mut self, addr: &str) -> Vec<CloseHandle> {
        self.health.insert(addr.to_string(), false);
        self.connections.remove(addr).map(|m| m.into_values().collect()).unwrap_or_default()
    }

    pub(crate) fn add_connection(&mut self, addr: &str, id: u64, close: CloseHandle) {
        self.connections.entry(addr.to_string()).or_default().insert(id, close);
    }

    pub(crate) fn remove_connection(&mut self, addr: &str, id: u64) {
        if let Some(conns) = self.connections.get_mut(addr) {
            conns.remove(&id);
            if conns.is_empty() {
                self.connections.remove(addr);
            }
        }
    }

    pub fn connection_count(&self, addr: &str) -> usize {
        self.connections.get(addr).map_or(0, HashMap::len)
    }

    /// Record the aggregated reachability. Returns a signal only on a state change.
    pub fn update_remote_ready(&mut self, ready: bool) -> Option<RemoteSignal> {
        if self.remote_ready == ready {
            return None;
        }
        self.remote_ready = ready;
        Some(if ready { RemoteSignal::Ready } else { RemoteSignal::NotReady })
    }

    pub fn remote_ready(&self) -> bool {
        self.remote_ready
    }

    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            current: self.current().map(str::to_string),
            remote_ready: self.remote_ready,
            backends: self
                .sorted
                .iter()
                .map(|addr| BackendHealth {
                    address: addr.clone(),
                    healthy: self.is_healthy(addr),
                    connections: self.connection_count(addr),
                })
                .collect(),
        }
    }
}
