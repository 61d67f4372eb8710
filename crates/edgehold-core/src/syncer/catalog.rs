//! Kind catalog resolution and per-scope informer factories.

use edgehold_types::{ApiError, ResourceKind, WatchScope};
use std::sync::Arc;

use super::informer::{Informer, InformerTiming};
use crate::error::{AppError, AppResult};
use crate::kube::{ListParams, ResourceApi};

/// Builds informers sharing one scope: cluster-wide, or restricted to this node.
pub struct InformerFactory {
    scope: WatchScope,
    node_name: String,
    api: Arc<dyn ResourceApi>,
    timing: InformerTiming,
    kinds: Vec<ResourceKind>,
}

impl InformerFactory {
    pub fn new(
        scope: WatchScope,
        node_name: impl Into<String>,
        api: Arc<dyn ResourceApi>,
        timing: InformerTiming,
    ) -> Self {
        Self { scope, node_name: node_name.into(), api, timing, kinds: Vec::new() }
    }

    pub fn scope(&self) -> WatchScope {
        self.scope
    }

    pub fn params_for(&self, kind: ResourceKind) -> ListParams {
        match kind.descriptor().node_field_selector(&self.node_name) {
            Some(fields) => ListParams::default().fields(fields),
            None => ListParams::default(),
        }
    }

    pub fn register(&mut self, kind: ResourceKind) {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    pub fn informers(&self) -> Vec<Informer> {
        self.kinds
            .iter()
            .map(|&kind| Informer::new(Arc::clone(&self.api), kind, self.params_for(kind), self.timing))
            .collect()
    }
}

/// Whether the central API serves `kind`. Only a definite "not served" answer
/// (unsupported or 404) returns `false`; other failures propagate.
pub async fn probe(api: &dyn ResourceApi, kind: ResourceKind) -> AppResult<bool> {
    match api.list(kind, &ListParams::default()).await {
        Ok(_) => Ok(true),
        Err(AppError::Api(ApiError::Unsupported { .. } | ApiError::NotFound { .. })) => Ok(false),
        Err(AppError::Api(ApiError::Status { code: 404, .. })) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Every kind to mirror, with probed kinds filtered by what the server supports.
pub async fn resolve_kinds(api: &dyn ResourceApi) -> AppResult<Vec<ResourceKind>> {
    let mut kinds = Vec::with_capacity(ResourceKind::ALL.len());
    for kind in ResourceKind::ALL {
        if kind.descriptor().needs_probe && !probe(api, kind).await? {
            tracing::info!(%kind, "Kind not served by the central API, skipping");
            continue;
        }
        kinds.push(kind);
    }
    Ok(kinds)
}

/// One factory per scope with every resolved kind registered in the right one.
pub fn build_factories(
    kinds: &[ResourceKind],
    node_name: &str,
    api: &Arc<dyn ResourceApi>,
    timing: InformerTiming,
) -> Vec<InformerFactory> {
    let mut cluster = InformerFactory::new(WatchScope::Cluster, node_name, Arc::clone(api), timing);
    let mut this_node = InformerFactory::new(WatchScope::ThisNode, node_name, Arc::clone(api), timing);
    for &kind in kinds {
        match kind.descriptor().scope {
            WatchScope::Cluster => cluster.register(kind),
            WatchScope::ThisNode => this_node.register(kind),
        }
    }
    vec![cluster, this_node]
}
