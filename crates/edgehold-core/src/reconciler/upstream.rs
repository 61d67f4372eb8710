//! Create-or-update, delete and full-list reconciliation against the central API.

use edgehold_types::{ResourceKind, ResourceObject};
use std::collections::HashSet;
use std::sync::Arc;

use super::gate::{self, CLUSTER_ID_LABEL};
use crate::error::{AppError, AppResult};
use crate::kube::{ListParams, ResourceApi};

/// What happened to one reported object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// Rejected by the edge-version gate
    Skipped,
    Deleted,
    /// Delete of an object the center never had
    Absent,
}

pub struct UpstreamReconciler {
    api: Arc<dyn ResourceApi>,
    conflict_retries: u32,
}

impl UpstreamReconciler {
    pub fn new(api: Arc<dyn ResourceApi>, conflict_retries: u32) -> Self {
        Self { api, conflict_retries: conflict_retries.max(1) }
    }

    /// Store `obj`, reported by `cluster`, under its composite name.
    ///
    /// Objects without an edge version are skipped. Creates it if absent. Otherwise it replaces the stored copy only if the reported edge
    /// version is strictly newer. Spec and status are written with separate retry budgets.
    pub async fn create_or_update(
        &self,
        kind: ResourceKind,
        cluster: &str,
        obj: ResourceObject,
    ) -> AppResult<Outcome> {
        let incoming = gate::to_central(obj, cluster);
        let outcome = self.write_spec(kind, &incoming).await?;
        if outcome != Outcome::Skipped && kind.descriptor().has_status && incoming.status().is_some() {
            self.write_status(kind, &incoming).await?;
        }
        Ok(outcome)
    }

    async fn write_spec(&self, kind: ResourceKind, incoming: &ResourceObject) -> AppResult<Outcome> {
        if gate::edge_version(incoming).is_none() {
            // Without an edge version no later report could ever replace it.
            tracing::debug!(%kind, key = %incoming.key(), "Unversioned report, not stored");
            return Ok(Outcome::Skipped);
        }
        let name = incoming.name();
        let namespace = incoming.namespace();
        for attempt in 1..=self.conflict_retries {
            let stored = match self.api.get(kind, namespace, name).await {
                Ok(stored) => stored,
                Err(e) if e.is_not_found() => match self.api.create(kind, incoming).await {
                    Ok(_) => {
                        tracing::debug!(%kind, key = %incoming.key(), "Created central copy");
                        return Ok(Outcome::Created);
                    },
                    Err(AppError::Api(e)) if e.is_already_exists() => {
                        tracing::debug!(
                            %kind,
                            key = %incoming.key(),
                            "Concurrent create (attempt {}/{})",
                            attempt,
                            self.conflict_retries
                        );
                        continue;
                    },
                    Err(e) => return Err(e),
                },
                Err(e) => return Err(e),
            };

            if !gate::supersedes(incoming, &stored) {
                tracing::debug!(
                    %kind,
                    key = %incoming.key(),
                    incoming = ?gate::edge_version(incoming),
                    stored = ?gate::edge_version(&stored),
                    "Stale report, keeping stored object"
                );
                return Ok(Outcome::Skipped);
            }

            let mut update = incoming.clone();
            gate::adapt(&mut update, &stored);
            match self.api.replace(kind, &update).await {
                Ok(_) => {
                    tracing::debug!(%kind, key = %incoming.key(), "Updated central copy");
                    return Ok(Outcome::Updated);
                },
                Err(e) if e.is_conflict() => {
                    tracing::debug!(
                        %kind,
                        key = %incoming.key(),
                        "Conflict on update (attempt {}/{})",
                        attempt,
                        self.conflict_retries
                    );
                },
                Err(e) => return Err(e),
            }
        }
        Err(self.exhausted(kind, incoming, "spec"))
    }

    async fn write_status(&self, kind: ResourceKind, incoming: &ResourceObject) -> AppResult<()> {
        let name = incoming.name();
        let namespace = incoming.namespace();
        for attempt in 1..=self.conflict_retries {
            let stored = self.api.get(kind, namespace, name).await?;
            if !gate::status_supersedes(incoming, &stored) {
                return Ok(());
            }
            let mut update = stored.clone();
            update.set_status(incoming.status().cloned());
            match self.api.replace_status(kind, &update).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(
                        %kind,
                        key = %incoming.key(),
                        "Conflict on status (attempt {}/{})",
                        attempt,
                        self.conflict_retries
                    );
                },
                Err(e) => return Err(e),
            }
        }
        Err(self.exhausted(kind, incoming, "status"))
    }

    fn exhausted(&self, kind: ResourceKind, obj: &ResourceObject, part: &str) -> AppError {
        AppError::Reconcile(format!(
            "{kind} {}: {part} write still conflicting after {} attempts",
            obj.key(),
            self.conflict_retries
        ))
    }

    /// Delete the central copy of edge key `key`. Absent is not an error.
    pub async fn delete(&self, kind: ResourceKind, cluster: &str, key: &str) -> AppResult<Outcome> {
        let (namespace, name) = gate::central_address(key, cluster);
        match self.api.delete(kind, namespace.as_deref(), &name).await {
            Ok(()) => {
                tracing::debug!(%kind, %cluster, %key, "Deleted central copy");
                Ok(Outcome::Deleted)
            },
            Err(e) if e.is_not_found() => Ok(Outcome::Absent),
            Err(e) => Err(e),
        }
    }

    /// Delete every central copy owned by `cluster` whose edge key is not in `full_list`.
    /// Returns the keys removed and the number of deletes that failed.
    pub async fn reconcile_full_list(
        &self,
        kind: ResourceKind,
        cluster: &str,
        full_list: &[String],
    ) -> AppResult<(Vec<String>, usize)> {
        let reported: HashSet<&str> = full_list.iter().map(String::as_str).collect();
        let params = ListParams::default().labels(format!("{CLUSTER_ID_LABEL}={cluster}"));
        let owned = self.api.list(kind, &params).await?;

        let mut removed = Vec::new();
        let mut failed = 0;
        for central in owned.items {
            let Some(edge_key) = gate::edge_key(&central, cluster) else {
                tracing::warn!(
                    %kind,
                    %cluster,
                    name = central.name(),
                    "Labelled object does not carry a composite name, leaving it"
                );
                continue;
            };
            if reported.contains(edge_key.as_str()) {
                continue;
            }
            match self.api.delete(kind, central.namespace(), central.name()).await {
                Ok(()) => removed.push(edge_key),
                Err(e) if e.is_not_found() => {},
                Err(e) => {
                    tracing::warn!(%kind, %cluster, key = %edge_key, "Full-list delete failed: {}", e);
                    failed += 1;
                },
            }
        }
        if !removed.is_empty() {
            tracing::info!(%kind, %cluster, removed = removed.len(), "Full-list reconciliation removed objects");
        }
        Ok((removed, failed))
    }
}
