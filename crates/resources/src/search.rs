//! Self-managed elasticsearch: a single-node deployment and its service.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec};
use logpipe_core::{ImageSettings, ValidatedSpec};

use crate::desired::DesiredEntry;
use crate::meta;
use crate::pod;
use crate::resource::{ManagedResource, ResourceId, ResourceKind};

pub const NAME: &str = "elasticsearch";
pub const PORT: u16 = 9200;

pub fn entries(spec: &ValidatedSpec, images: &ImageSettings) -> Vec<DesiredEntry> {
    if !spec.search_engine_managed() {
        return ids(spec.namespace()).into_iter().map(DesiredEntry::Absent).collect();
    }
    vec![
        DesiredEntry::present(ManagedResource::Deployment(deployment(spec, images))),
        DesiredEntry::present(ManagedResource::Service(pod::service(NAME, spec, PORT, None))),
    ]
}

pub fn ids(namespace: &str) -> Vec<ResourceId> {
    vec![
        ResourceId::namespaced(ResourceKind::Deployment, NAME, namespace),
        service_id(namespace),
    ]
}

/// The service the endpoint is discovered from.
pub fn service_id(namespace: &str) -> ResourceId {
    ResourceId::namespaced(ResourceKind::Service, NAME, namespace)
}

fn deployment(spec: &ValidatedSpec, images: &ImageSettings) -> Deployment {
    let image = images.search_engine_image(spec.version());
    Deployment {
        metadata: meta::workload(NAME, spec, meta::fingerprint([image.as_str()])),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: meta::selector(NAME),
            template: pod::template(
                NAME,
                PodSpec {
                    containers: vec![Container {
                        name: NAME.to_string(),
                        image: Some(image),
                        ports: Some(vec![pod::container_port(PORT)]),
                        env: Some(vec![pod::env("discovery.type", "single-node")]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                },
            ),
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}
