//! Edge agent.
//!
//! Turns the connectivity monitor's [`RemoteSignal`]s into store mode transitions and sync
//! session lifecycles:
//!
//! ```text
//!                Ready: start SyncSession, enter_connected() (MergeDelete)
//!  DISCONNECTED ────────────────────────────────────────────────────────▶ CONNECTED
//!       ▲   │ attach failed: retry every attach_retry while ready             │
//!       │   └──────┘                                                          │
//!       └──────────────── NotReady: stop session, enter_disconnected() ───────┘
//! ```

mod report_builder;


pub use report_builder::ReportBuilder;

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

use crate::connectivity::RemoteSignal;
use crate::error::AppResult;
use crate::kube::ResourceApi;
use crate::store::LocalStore;
use crate::syncer::{SessionConfig, SyncSession};
use crate::watch::SubscriberRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

pub struct EdgeAgent {
    api: Arc<dyn ResourceApi>,
    store: Arc<LocalStore>,
    registry: Arc<SubscriberRegistry>,
    session_config: SessionConfig,
    attach_retry: Duration,
    state: RwLock<ConnectionState>,
    /// Held across a whole attach or detach, so transitions never interleave.
    session: Mutex<Option<SyncSession>>,
}

impl EdgeAgent {
    pub fn new(
        api: Arc<dyn ResourceApi>,
        store: Arc<LocalStore>,
        registry: Arc<SubscriberRegistry>,
        session_config: SessionConfig,
        attach_retry: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            store,
            registry,
            session_config,
            attach_retry,
            state: RwLock::new(ConnectionState::Disconnected),
            session: Mutex::new(None),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub async fn handle_signal(&self, signal: RemoteSignal) -> AppResult<()> {
        match signal {
            RemoteSignal::Ready => self.attach().await,
            RemoteSignal::NotReady => {
                self.detach().await;
                Ok(())
            },
        }
    }

    /// Build a fresh sync session, then reconcile the store. No-op if already attached.
    pub async fn attach(&self) -> AppResult<()> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let session = SyncSession::start(
            Arc::clone(&self.api),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            &self.session_config,
        )
        .await?;
        if let Err(e) = self.store.enter_connected() {
            session.shutdown().await;
            return Err(e);
        }
        *slot = Some(session);
        *self.state.write() = ConnectionState::Connected;
        tracing::info!("Edge attached to the central API");
        Ok(())
    }

    /// Tear the session down and serve from local state. No-op if already detached.
    pub async fn detach(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            return;
        };
        session.shutdown().await;
        self.store.enter_disconnected();
        *self.state.write() = ConnectionState::Disconnected;
        tracing::warn!("Edge detached from the central API");
    }

    /// Consume `signals` until they end or `shutdown` flips. While the remote is ready but
    /// the agent is still detached, attaching is retried every `attach_retry`.
    pub fn start_agent_task(
        self: &Arc<Self>,
        mut signals: mpsc::Receiver<RemoteSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let agent = Arc::clone(self);

        tokio::spawn(async move {
            let mut remote_ready = false;
            loop {
                let retry_pending =
                    remote_ready && agent.state() == ConnectionState::Disconnected;
                tokio::select! {
                    signal = signals.recv() => match signal {
                        Some(signal) => remote_ready = signal == RemoteSignal::Ready,
                        None => break,
                    },
                    () = tokio::time::sleep(agent.attach_retry), if retry_pending => {}
                    _ = shutdown.changed() => break,
                }

                let result = if remote_ready {
                    agent.attach().await
                } else {
                    agent.detach().await;
                    Ok(())
                };
                if let Err(e) = result {
                    tracing::warn!("Attach failed, retrying in {:?}: {}", agent.attach_retry, e);
                }
            }

            if let Some(session) = agent.session.lock().await.take() {
                session.shutdown().await;
            }
            tracing::info!("Edge agent stopped");
        })
    }
}
