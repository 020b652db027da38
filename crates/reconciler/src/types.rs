//! Core types for the reconciler.

use std::fmt;
use std::time::Duration;

use logpipe_core::EndpointSpec;
use logpipe_resources::{ManagedResource, ResourceId};

/// Primitive operation against the cluster store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Lifecycle phase of a managed resource.
///
/// `Absent -> Creating -> Present`, `Present -> Updating -> Present` on
/// drift, `Present -> Deleting -> Absent` on toggle-off or staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePhase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl ResourcePhase {
    /// Phase reached once the in-flight operation succeeds.
    pub const fn settled(self) -> Self {
        match self {
            Self::Creating | Self::Updating | Self::Present => Self::Present,
            Self::Deleting | Self::Absent => Self::Absent,
        }
    }
}

/// Actions the reconciler can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    /// Submit a resource that does not exist yet.
    Create(ManagedResource),
    /// Replace a config payload in place, then delete the workload that
    /// mounts it so its pods pick up the new content.
    UpdatePayload {
        resource: ManagedResource,
        dependent: Option<ResourceId>,
    },
    /// Remove a resource whose component was disabled.
    Delete(ResourceId),
    /// Remove a workload built from outdated inputs; it is recreated on the
    /// next pass.
    Recreate(ResourceId),
}

impl ReconcileAction {
    /// Get the resource this action targets.
    pub fn target(&self) -> ResourceId {
        match self {
            Self::Create(resource) | Self::UpdatePayload { resource, .. } => resource.id(),
            Self::Delete(id) | Self::Recreate(id) => id.clone(),
        }
    }

    /// Phase the target leaves and the phase it passes through.
    pub const fn transition(&self) -> (ResourcePhase, ResourcePhase) {
        match self {
            Self::Create(_) => (ResourcePhase::Absent, ResourcePhase::Creating),
            Self::UpdatePayload { .. } => (ResourcePhase::Present, ResourcePhase::Updating),
            Self::Delete(_) | Self::Recreate(_) => (ResourcePhase::Present, ResourcePhase::Deleting),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::UpdatePayload { .. } => "update",
            Self::Delete(_) => "delete",
            Self::Recreate(_) => "recreate",
        }
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::UpdatePayload {
                resource,
                dependent: Some(dependent),
            } => format!("update {} and restart {dependent}", resource.id()),
            _ => format!("{} {}", self.name(), self.target()),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    /// The single state-changing action applied, if any.
    pub action_taken: Option<ReconcileAction>,
    /// Search endpoint resolved during the pass.
    pub endpoint: Option<EndpointSpec>,
    /// When the next pass should run.
    pub requeue_after: Duration,
    /// Observed state matched the desired state.
    pub converged: bool,
}

impl ReconcileResult {
    pub const fn changed(action: ReconcileAction, endpoint: Option<EndpointSpec>, requeue_after: Duration) -> Self {
        Self {
            action_taken: Some(action),
            endpoint,
            requeue_after,
            converged: false,
        }
    }

    pub const fn converged(endpoint: EndpointSpec, requeue_after: Duration) -> Self {
        Self {
            action_taken: None,
            endpoint: Some(endpoint),
            requeue_after,
            converged: true,
        }
    }
}
