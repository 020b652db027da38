//! Reconciliation engine.
//!
//! One pass validates the pipeline, resolves levels in dependency order and
//! applies at most one state-changing action before returning. Convergence
//! happens across passes; each pass starts from a fresh read of the store.

use std::sync::Arc;
use std::time::Duration;

use logpipe_core::{EndpointSpec, ImageSettings, LogPipeline, ReconcileSettings, ValidatedSpec, validate};
use logpipe_resources::{DesiredEntry, DesiredLevel, DesiredSet, DesiredStateBuilder, Drift, ManagedResource, search};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::ClusterStore;
use crate::types::{ReconcileAction, ReconcileResult};

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Requeue delay after a converged pass.
    pub resync_interval: Duration,
    /// Requeue delay after a pass that changed something.
    pub change_requeue: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from(&ReconcileSettings::default())
    }
}

impl From<&ReconcileSettings> for ReconcilerConfig {
    fn from(settings: &ReconcileSettings) -> Self {
        Self {
            resync_interval: settings.resync_interval,
            change_requeue: settings.change_requeue,
        }
    }
}

/// Decide the action that moves `observed` toward `desired`, if any.
pub fn ensure(desired: &DesiredEntry, observed: Option<&ManagedResource>) -> Option<ReconcileAction> {
    match (desired, observed) {
        (DesiredEntry::Present { resource, .. }, None) => Some(ReconcileAction::Create(resource.clone())),
        (DesiredEntry::Present { resource, dependent }, Some(current)) => match resource.drift(current) {
            Drift::None => None,
            Drift::Payload(updated) => Some(ReconcileAction::UpdatePayload {
                resource: updated,
                dependent: dependent.clone(),
            }),
            Drift::Stale => Some(ReconcileAction::Recreate(resource.id())),
        },
        (DesiredEntry::Absent(id), Some(current)) if current.is_managed() => Some(ReconcileAction::Delete(id.clone())),
        // Objects of the same name created by someone else are left alone.
        (DesiredEntry::Absent(_), _) => None,
    }
}

/// K8s-style reconciler for a log pipeline.
pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    builder: DesiredStateBuilder,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ClusterStore>, builder: DesiredStateBuilder, config: ReconcilerConfig) -> Self {
        Self {
            store,
            builder,
            config,
        }
    }

    /// Run one convergence pass.
    ///
    /// # Errors
    ///
    /// `InvalidSpec` before any store access when the pipeline fails
    /// validation; otherwise the first store or endpoint failure, which
    /// aborts the rest of the pass. Mutations already applied are kept.
    pub async fn reconcile(&self, pipeline: &LogPipeline) -> Result<ReconcileResult> {
        let spec = validate(pipeline).map_err(|errors| {
            warn!(violations = errors.len(), "Pipeline failed validation:\n{errors}");
            Error::InvalidSpec(errors)
        })?;

        debug!(pipeline = spec.name(), namespace = spec.namespace(), "Starting reconciliation");

        let foundation = self.builder.foundation(&spec);
        if let Some(action) = self.converge(foundation.levels()).await? {
            return Ok(ReconcileResult::changed(action, None, self.config.change_requeue));
        }

        let endpoint = self.resolve_endpoint(&spec).await?;
        let desired = self.builder.build(&spec, &endpoint);
        if let Some(action) = self.converge(remaining(&desired)).await? {
            return Ok(ReconcileResult::changed(
                action,
                Some(endpoint),
                self.config.change_requeue,
            ));
        }

        info!(pipeline = spec.name(), endpoint = %endpoint, "Pipeline converged");
        Ok(ReconcileResult::converged(endpoint, self.config.resync_interval))
    }

    /// Evaluate levels in order and apply the first action found.
    async fn converge<'a, I>(&self, levels: I) -> Result<Option<ReconcileAction>>
    where
        I: IntoIterator<Item = &'a DesiredLevel>,
    {
        for level in levels {
            for entry in &level.entries {
                let observed = self.store.get(&entry.id()).await?;
                if let Some(action) = ensure(entry, observed.as_ref()) {
                    let target = action.target();
                    let (from, via) = action.transition();
                    info!(
                        level = %level.level,
                        action = action.name(),
                        kind = %target.kind,
                        name = %target.name,
                        namespace = ?target.namespace,
                        from = ?from,
                        via = ?via,
                        "{}",
                        action.description()
                    );
                    self.apply(&action).await?;
                    debug!(resource = %target, phase = ?via.settled(), "Action applied");
                    return Ok(Some(action));
                }
            }
        }
        Ok(None)
    }

    async fn apply(&self, action: &ReconcileAction) -> Result<()> {
        match action {
            ReconcileAction::Create(resource) => self.store.create(resource).await,
            ReconcileAction::UpdatePayload { resource, dependent } => {
                self.store.update(resource).await?;
                match dependent {
                    Some(dependent) => self.store.delete(dependent).await,
                    None => Ok(()),
                }
            }
            ReconcileAction::Delete(id) | ReconcileAction::Recreate(id) => self.store.delete(id).await,
        }
    }

    /// Statically configured endpoint, or the address of the self-managed
    /// search engine's service.
    async fn resolve_endpoint(&self, spec: &ValidatedSpec) -> Result<EndpointSpec> {
        if let Some(endpoint) = spec.external_endpoint() {
            return Ok(endpoint);
        }

        let id = search::service_id(spec.namespace());
        let service = self
            .store
            .get(&id)
            .await?
            .ok_or_else(|| Error::endpoint_unavailable(format!("{id} not found")))?;
        let (host, port) = service
            .service_address()
            .ok_or_else(|| Error::endpoint_unavailable(format!("{id} has no cluster address yet")))?;

        let endpoint = EndpointSpec::new(host, port);
        debug!(endpoint = %endpoint, "Resolved search endpoint");
        Ok(endpoint)
    }

    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

fn remaining(desired: &DesiredSet) -> impl Iterator<Item = &DesiredLevel> {
    desired.levels().iter().filter(|level| !level.level.is_foundation())
}

/// Builder for Reconciler.
#[derive(Default)]
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn ClusterStore>>,
    images: ImageSettings,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ClusterStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: ImageSettings) -> Self {
        self.images = images;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns an error when no store was provided.
    pub fn build(self) -> Result<Reconciler> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("cluster store is required"))?;
        Ok(Reconciler::new(
            store,
            DesiredStateBuilder::new(self.images),
            self.config,
        ))
    }
}
