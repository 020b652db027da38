//! Cluster store and pipeline source backed by the Kubernetes API.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource};
use logpipe_core::LogPipeline;
use logpipe_reconciler::{ClusterStore, Error, PipelineSource, Result, StoreOperation};
use logpipe_resources::{ManagedResource, ResourceId, ResourceKind};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// [`ClusterStore`] over typed API handles, one per managed kind.
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl KubeClusterStore {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, id: &ResourceId) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), id.namespace.as_deref().unwrap_or_default())
    }

    fn cluster<K>(&self) -> Api<K>
    where
        K: Resource,
        <K as Resource>::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }

    async fn write(&self, operation: StoreOperation, resource: &ManagedResource) -> Result<()> {
        let id = resource.id();
        match resource {
            ManagedResource::ServiceAccount(r) => write(&self.namespaced(&id), operation, &id, r).await,
            ManagedResource::ClusterRole(r) => write(&self.cluster(), operation, &id, r).await,
            ManagedResource::ClusterRoleBinding(r) => write(&self.cluster(), operation, &id, r).await,
            ManagedResource::ConfigMap(r) => write(&self.namespaced(&id), operation, &id, r).await,
            ManagedResource::Service(r) => write(&self.namespaced(&id), operation, &id, r).await,
            ManagedResource::Deployment(r) => write(&self.namespaced(&id), operation, &id, r).await,
            ManagedResource::DaemonSet(r) => write(&self.namespaced(&id), operation, &id, r).await,
        }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get(&self, id: &ResourceId) -> Result<Option<ManagedResource>> {
        Ok(match id.kind {
            ResourceKind::ServiceAccount => {
                fetch::<ServiceAccount>(&self.namespaced(id), id).await?.map(ManagedResource::ServiceAccount)
            }
            ResourceKind::ClusterRole => fetch::<ClusterRole>(&self.cluster(), id).await?.map(ManagedResource::ClusterRole),
            ResourceKind::ClusterRoleBinding => fetch::<ClusterRoleBinding>(&self.cluster(), id)
                .await?
                .map(ManagedResource::ClusterRoleBinding),
            ResourceKind::ConfigMap => fetch::<ConfigMap>(&self.namespaced(id), id).await?.map(ManagedResource::ConfigMap),
            ResourceKind::Service => fetch::<Service>(&self.namespaced(id), id).await?.map(ManagedResource::Service),
            ResourceKind::Deployment => fetch::<Deployment>(&self.namespaced(id), id).await?.map(ManagedResource::Deployment),
            ResourceKind::DaemonSet => fetch::<DaemonSet>(&self.namespaced(id), id).await?.map(ManagedResource::DaemonSet),
        })
    }

    async fn create(&self, resource: &ManagedResource) -> Result<()> {
        self.write(StoreOperation::Create, resource).await
    }

    async fn update(&self, resource: &ManagedResource) -> Result<()> {
        self.write(StoreOperation::Update, resource).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        match id.kind {
            ResourceKind::ServiceAccount => remove::<ServiceAccount>(&self.namespaced(id), id).await,
            ResourceKind::ClusterRole => remove::<ClusterRole>(&self.cluster(), id).await,
            ResourceKind::ClusterRoleBinding => remove::<ClusterRoleBinding>(&self.cluster(), id).await,
            ResourceKind::ConfigMap => remove::<ConfigMap>(&self.namespaced(id), id).await,
            ResourceKind::Service => remove::<Service>(&self.namespaced(id), id).await,
            ResourceKind::Deployment => remove::<Deployment>(&self.namespaced(id), id).await,
            ResourceKind::DaemonSet => remove::<DaemonSet>(&self.namespaced(id), id).await,
        }
    }
}

async fn fetch<K>(api: &Api<K>, id: &ResourceId) -> Result<Option<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.get_opt(&id.name)
        .await
        .map_err(|e| Error::store(StoreOperation::Get, id.clone(), e.to_string()))
}

async fn write<K>(api: &Api<K>, operation: StoreOperation, id: &ResourceId, object: &K) -> Result<()>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    let params = PostParams::default();
    let result = match operation {
        StoreOperation::Update => api.replace(&id.name, &params, object).await,
        _ => api.create(&params, object).await,
    };
    result
        .map(|_| ())
        .map_err(|e| Error::store(operation, id.clone(), e.to_string()))
}

/// Delete, treating an already-missing object as success.
async fn remove<K>(api: &Api<K>, id: &ResourceId) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    deleted(api.delete(&id.name, &DeleteParams::default()).await, id)
}

fn deleted<T>(result: kube::Result<T>, id: &ResourceId) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(e) => Err(Error::store(StoreOperation::Delete, id.clone(), e.to_string())),
    }
}

/// Reads one named `LogPipeline` from the cluster.
pub struct KubePipelineSource {
    api: Api<LogPipeline>,
    name: String,
}

impl KubePipelineSource {
    pub fn new(client: Client, namespace: &str, name: impl Into<String>) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            name: name.into(),
        }
    }
}

#[async_trait]
impl PipelineSource for KubePipelineSource {
    async fn fetch(&self) -> Result<Option<LogPipeline>> {
        self.api
            .get_opt(&self.name)
            .await
            .map_err(|e| Error::pipeline_unavailable(format!("LogPipeline {}: {e}", self.name)))
    }
}
