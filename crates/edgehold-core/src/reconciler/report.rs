//! Applying a whole report envelope. Every item fails alone.

use edgehold_types::{split_key, ReportCommand, ReportEnvelope, ReportSummary, ResourceObject};

use super::upstream::{Outcome, UpstreamReconciler};
use crate::error::{AppError, AppResult};

impl UpstreamReconciler {
    /// Decode and apply a serialized envelope. A malformed payload is rejected before any
    /// write reaches the central API.
    pub async fn apply_json(&self, raw: &[u8]) -> AppResult<ReportSummary> {
        let envelope: ReportEnvelope = serde_json::from_slice(raw)?;
        if envelope.header.source_cluster.trim().is_empty() {
            return Err(AppError::InvalidReport("sourceCluster must not be empty".to_string()));
        }
        Ok(self.apply_report(&envelope).await)
    }

    pub async fn apply_report(&self, envelope: &ReportEnvelope) -> ReportSummary {
        let mut summary = ReportSummary::default();
        if envelope.header.command == ReportCommand::Ping {
            return summary;
        }
        let kind = envelope.resource_kind;
        let cluster = envelope.header.source_cluster.as_str();
        let body = &envelope.body;
        if cluster.trim().is_empty() {
            // Composite names and the cluster label both need an owner.
            summary.failed = body.update_map.len() + body.del_map.len();
            tracing::warn!(%kind, items = summary.failed, "Rejecting report without a source cluster");
            return summary;
        }

        for (key, value) in &body.update_map {
            let mut obj = match ResourceObject::try_from(value.clone()) {
                Ok(obj) => obj,
                Err(e) => {
                    tracing::warn!(%kind, %cluster, %key, "Rejecting malformed object: {}", e);
                    summary.failed += 1;
                    continue;
                },
            };
            if obj.namespace().is_none() {
                if let (Some(ns), _) = split_key(key) {
                    obj.set_namespace(Some(ns));
                }
            }
            match self.create_or_update(kind, cluster, obj).await {
                Ok(Outcome::Created) => summary.created += 1,
                Ok(Outcome::Updated) => summary.updated += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!(%kind, %cluster, %key, "Failed to apply reported object: {}", e);
                    summary.failed += 1;
                },
            }
        }

        for key in body.del_map.keys() {
            match self.delete(kind, cluster, key).await {
                Ok(Outcome::Deleted) => summary.deleted += 1,
                Ok(_) => {},
                Err(e) => {
                    tracing::error!(%kind, %cluster, %key, "Failed to delete reported object: {}", e);
                    summary.failed += 1;
                },
            }
        }

        if let Some(full_list) = &body.full_list {
            match self.reconcile_full_list(kind, cluster, full_list).await {
                Ok((removed, failed)) => {
                    summary.deleted += removed.len();
                    summary.failed += failed;
                },
                Err(e) => {
                    tracing::error!(%kind, %cluster, "Full-list reconciliation failed: {}", e);
                    summary.failed += 1;
                },
            }
        }

        tracing::info!(
            %kind,
            %cluster,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            deleted = summary.deleted,
            failed = summary.failed,
            "Report applied"
        );
        summary
    }
}
