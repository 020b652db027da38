//! Cluster store trait and implementations.
//!
//! The engine only ever talks to the cluster through [`ClusterStore`]:
//! lookup by identity, create, update and delete. Deleting something that
//! is already gone succeeds.

use std::collections::BTreeMap;

use async_trait::async_trait;
use logpipe_resources::{ManagedResource, ResourceId};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::StoreOperation;

#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Look up a resource by identity.
    async fn get(&self, id: &ResourceId) -> Result<Option<ManagedResource>>;

    /// Create a resource that does not exist yet.
    async fn create(&self, resource: &ManagedResource) -> Result<()>;

    /// Replace an existing resource.
    async fn update(&self, resource: &ManagedResource) -> Result<()>;

    /// Delete a resource. Not-found is success.
    async fn delete(&self, id: &ResourceId) -> Result<()>;
}

/// A state-changing call that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub operation: StoreOperation,
    pub id: ResourceId,
}

impl Mutation {
    pub const fn new(operation: StoreOperation, id: ResourceId) -> Self {
        Self { operation, id }
    }
}

/// In-memory cluster store for testing.
///
/// Records every effective mutation, assigns cluster IPs to created
/// services, and fails injected operations once.
#[derive(Default)]
pub struct InMemoryClusterStore {
    objects: RwLock<BTreeMap<ResourceId, ManagedResource>>,
    mutations: RwLock<Vec<Mutation>>,
    failures: RwLock<Vec<(StoreOperation, ResourceId)>>,
    revision: RwLock<u64>,
}

impl InMemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording a mutation.
    pub async fn insert(&self, resource: ManagedResource) {
        self.objects.write().await.insert(resource.id(), resource);
    }

    /// Remove an object without recording a mutation, as if deleted out of band.
    pub async fn remove(&self, id: &ResourceId) -> Option<ManagedResource> {
        self.objects.write().await.remove(id)
    }

    /// Fail the next `operation` on `id`.
    pub async fn fail_next(&self, operation: StoreOperation, id: ResourceId) {
        self.failures.write().await.push((operation, id));
    }

    pub async fn mutations(&self) -> Vec<Mutation> {
        self.mutations.read().await.clone()
    }

    pub async fn clear_mutations(&self) {
        self.mutations.write().await.clear();
    }

    pub async fn contains(&self, id: &ResourceId) -> bool {
        self.objects.read().await.contains_key(id)
    }

    pub async fn ids(&self) -> Vec<ResourceId> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn check_injected(&self, operation: StoreOperation, id: &ResourceId) -> Result<()> {
        let mut failures = self.failures.write().await;
        match failures.iter().position(|(op, target)| *op == operation && target == id) {
            Some(index) => {
                failures.remove(index);
                Err(Error::store(operation, id.clone(), "injected failure"))
            }
            None => Ok(()),
        }
    }

    async fn record(&self, operation: StoreOperation, id: ResourceId) {
        self.mutations.write().await.push(Mutation::new(operation, id));
    }

    /// Stamp the fields the cluster assigns on write.
    async fn admit(&self, mut resource: ManagedResource) -> ManagedResource {
        let revision = {
            let mut revision = self.revision.write().await;
            *revision += 1;
            *revision
        };
        resource.metadata_mut().resource_version = Some(revision.to_string());

        if let ManagedResource::Service(service) = &mut resource {
            if let Some(spec) = service.spec.as_mut() {
                if spec.cluster_ip.is_none() {
                    spec.cluster_ip = Some(format!("10.96.{}.{}", revision / 256, revision % 256));
                }
            }
        }
        resource
    }
}

#[async_trait]
impl ClusterStore for InMemoryClusterStore {
    async fn get(&self, id: &ResourceId) -> Result<Option<ManagedResource>> {
        self.check_injected(StoreOperation::Get, id).await?;
        Ok(self.objects.read().await.get(id).cloned())
    }

    async fn create(&self, resource: &ManagedResource) -> Result<()> {
        let id = resource.id();
        self.check_injected(StoreOperation::Create, &id).await?;
        if self.contains(&id).await {
            return Err(Error::store(StoreOperation::Create, id, "already exists"));
        }

        let admitted = self.admit(resource.clone()).await;
        self.objects.write().await.insert(id.clone(), admitted);
        self.record(StoreOperation::Create, id).await;
        Ok(())
    }

    async fn update(&self, resource: &ManagedResource) -> Result<()> {
        let id = resource.id();
        self.check_injected(StoreOperation::Update, &id).await?;
        if !self.contains(&id).await {
            return Err(Error::store(StoreOperation::Update, id, "not found"));
        }

        let admitted = self.admit(resource.clone()).await;
        self.objects.write().await.insert(id.clone(), admitted);
        self.record(StoreOperation::Update, id).await;
        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.check_injected(StoreOperation::Delete, id).await?;
        if self.objects.write().await.remove(id).is_some() {
            self.record(StoreOperation::Delete, id.clone()).await;
        }
        Ok(())
    }
}

/// Decorator that logs every store call.
pub struct TracingClusterStore<S: ClusterStore> {
    inner: S,
}

impl<S: ClusterStore> TracingClusterStore<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ClusterStore> ClusterStore for TracingClusterStore<S> {
    async fn get(&self, id: &ResourceId) -> Result<Option<ManagedResource>> {
        tracing::trace!(kind = %id.kind, name = %id.name, namespace = ?id.namespace, "Getting resource");
        let result = self.inner.get(id).await;
        if let Ok(found) = &result {
            tracing::trace!(resource = %id, found = found.is_some(), "Resource looked up");
        }
        result
    }

    async fn create(&self, resource: &ManagedResource) -> Result<()> {
        let id = resource.id();
        tracing::debug!(kind = %id.kind, name = %id.name, namespace = ?id.namespace, "Creating resource");
        log_failure(StoreOperation::Create, &id, self.inner.create(resource).await)
    }

    async fn update(&self, resource: &ManagedResource) -> Result<()> {
        let id = resource.id();
        tracing::debug!(kind = %id.kind, name = %id.name, namespace = ?id.namespace, "Updating resource");
        log_failure(StoreOperation::Update, &id, self.inner.update(resource).await)
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        tracing::debug!(kind = %id.kind, name = %id.name, namespace = ?id.namespace, "Deleting resource");
        log_failure(StoreOperation::Delete, id, self.inner.delete(id).await)
    }
}

fn log_failure(operation: StoreOperation, id: &ResourceId, result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        tracing::warn!(operation = %operation, resource = %id, error = %e, "Store operation failed");
    }
    result
}
