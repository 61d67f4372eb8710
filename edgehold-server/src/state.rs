//! Shared handler state for the edge and central surfaces.

use std::sync::Arc;

use edgehold_core::connectivity::ConnectivityMonitor;
use edgehold_core::edge::{EdgeAgent, ReportBuilder};
use edgehold_core::reconciler::UpstreamReconciler;
use edgehold_core::store::LocalStore;
use edgehold_core::watch::SubscriberRegistry;

#[derive(Clone)]
pub struct EdgeState {
    pub(crate) inner: Arc<EdgeStateInner>,
}

pub struct EdgeStateInner {
    pub agent: Arc<EdgeAgent>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub reports: ReportBuilder,
}

impl EdgeState {
    pub fn new(agent: Arc<EdgeAgent>, monitor: Arc<ConnectivityMonitor>, cluster_id: &str) -> Self {
        let reports = ReportBuilder::new(cluster_id, Arc::clone(agent.store()));
        Self { inner: Arc::new(EdgeStateInner { agent, monitor, reports }) }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        self.inner.agent.store()
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.inner.agent.registry()
    }
}

#[derive(Clone)]
pub struct CentralState {
    pub(crate) inner: Arc<CentralStateInner>,
}

pub struct CentralStateInner {
    pub reconciler: UpstreamReconciler,
}

impl CentralState {
    pub fn new(reconciler: UpstreamReconciler) -> Self {
        Self { inner: Arc::new(CentralStateInner { reconciler }) }
    }
}
