//! kibana, exposed through a load balancer.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec};
use logpipe_core::{EndpointSpec, ImageSettings, ValidatedSpec};

use crate::desired::DesiredEntry;
use crate::meta;
use crate::pod;
use crate::resource::{ManagedResource, ResourceId, ResourceKind};

pub const NAME: &str = "kibana";
pub const PORT: u16 = 5601;

pub fn entries(spec: &ValidatedSpec, endpoint: &EndpointSpec, images: &ImageSettings) -> Vec<DesiredEntry> {
    if !spec.dashboard_enabled() {
        return ids(spec.namespace()).into_iter().map(DesiredEntry::Absent).collect();
    }
    vec![
        DesiredEntry::present(ManagedResource::Deployment(deployment(spec, endpoint, images))),
        DesiredEntry::present(ManagedResource::Service(pod::service(
            NAME,
            spec,
            PORT,
            Some("LoadBalancer"),
        ))),
    ]
}

pub fn ids(namespace: &str) -> Vec<ResourceId> {
    vec![
        ResourceId::namespaced(ResourceKind::Deployment, NAME, namespace),
        ResourceId::namespaced(ResourceKind::Service, NAME, namespace),
    ]
}

fn deployment(spec: &ValidatedSpec, endpoint: &EndpointSpec, images: &ImageSettings) -> Deployment {
    let image = images.dashboard_image(spec.version());
    let url = endpoint.url();

    Deployment {
        metadata: meta::workload(NAME, spec, meta::fingerprint([url.as_str(), image.as_str()])),
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
                        env: Some(vec![
                            pod::env("ELASTICSEARCH_URL", url.clone()),
                            pod::env("ELASTICSEARCH_HOSTS", url),
                        ]),
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
