//! Shared fixtures for reconciliation tests.

#![allow(dead_code, clippy::unreachable)]

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use logpipe_core::{
    LogPipeline, LogPipelineSpec, OutputSpec, ParserSpec, SearchEngineSpec, WatchRule,
};
use logpipe_reconciler::{
    ClusterStore, InMemoryClusterStore, ReconcileResult, Reconciler, ReconcilerBuilder, Result,
};
use logpipe_resources::{ManagedResource, ResourceId, ResourceKind};

pub const NAMESPACE: &str = "logging";

/// Upper bound on passes needed to converge from an empty cluster.
pub const MAX_PASSES: usize = 64;

pub fn pipeline() -> LogPipeline {
    let mut pipeline = LogPipeline::new(
        "main",
        LogPipelineSpec {
            namespace: NAMESPACE.into(),
            es_kib_version: "7.10.2".into(),
            include_k8s_metadata: true,
            parsers: vec![
                ParserSpec::new("json", "^(?<log>.*)$"),
                ParserSpec::new("nginx", "^(?<remote>[^ ]*) (?<request>.*)$"),
            ],
            watch: vec![
                WatchRule {
                    namespace: "checkout".into(),
                    tag: "checkout".into(),
                    parsers: vec!["json".into()],
                    outputs: vec![OutputSpec::search_engine("checkout-*")],
                    ..WatchRule::default()
                },
                WatchRule {
                    namespace: "edge".into(),
                    deployments: vec!["ingress".into()],
                    parsers: vec!["nginx".into()],
                    outputs: vec![OutputSpec::search_engine("edge-*"), OutputSpec::stdout()],
                    ..WatchRule::default()
                },
            ],
            elasticsearch: SearchEngineSpec::self_managed(),
            kibana: true,
            ..LogPipelineSpec::default()
        },
    );
    pipeline.metadata.namespace = Some(NAMESPACE.into());
    pipeline.metadata.uid = Some("9d5e4c3b-0000-4000-8000-0000000000ff".into());
    pipeline
}

pub fn setup() -> (Reconciler, Arc<InMemoryClusterStore>) {
    let store = Arc::new(InMemoryClusterStore::new());
    let reconciler = ReconcilerBuilder::new()
        .with_store(store.clone())
        .build()
        .unwrap_or_else(|e| unreachable!("store provided: {e}"));
    (reconciler, store)
}

pub fn id(kind: ResourceKind, name: &str) -> ResourceId {
    ResourceId::namespaced(kind, name, NAMESPACE)
}

/// Run passes until one reports convergence.
pub async fn converge(reconciler: &Reconciler, pipeline: &LogPipeline) -> Result<ReconcileResult> {
    for _ in 0..MAX_PASSES {
        let result = reconciler.reconcile(pipeline).await?;
        if result.converged {
            return Ok(result);
        }
    }
    unreachable!("pipeline did not converge within {MAX_PASSES} passes")
}

pub async fn deployment(store: &InMemoryClusterStore, name: &str) -> Option<Deployment> {
    match store.get(&id(ResourceKind::Deployment, name)).await {
        Ok(Some(ManagedResource::Deployment(deployment))) => Some(deployment),
        _ => None,
    }
}

/// Value of an environment variable of a deployment's first container.
pub fn env_value(deployment: &Deployment, name: &str) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .env
        .as_ref()?
        .iter()
        .find(|var| var.name == name)?
        .value
        .clone()
}
