//! fluentd: forward receiver, its rendered configuration and deployment.
//!
//! The search endpoint reaches fluentd through environment variables, so
//! an endpoint change alters the deployment's fingerprint and not its
//! configuration text.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{ConfigMap, Container, PodSpec, VolumeMount};
use logpipe_compiler::aggregator::{FORWARD_PORT, SEARCH_HOST_ENV, SEARCH_PORT_ENV, SEARCH_SCHEME_ENV};
use logpipe_compiler::{AGGREGATOR_FILE, RoutingSpec, aggregator_files};
use logpipe_core::{EndpointSpec, ImageSettings, ValidatedSpec};

use crate::desired::DesiredEntry;
use crate::meta;
use crate::pod;
use crate::resource::{ManagedResource, ResourceId, ResourceKind};

pub const NAME: &str = "fluentd";
pub const CONFIG_MAP: &str = "fluentd-config";
const CONFIG_VOLUME: &str = "config-volume";

pub fn entries(
    spec: &ValidatedSpec,
    routing: &RoutingSpec,
    endpoint: &EndpointSpec,
    images: &ImageSettings,
) -> Vec<DesiredEntry> {
    let data = aggregator_files(routing);
    let deployment_id = ResourceId::namespaced(ResourceKind::Deployment, NAME, spec.namespace());
    vec![
        DesiredEntry::present(ManagedResource::Service(pod::service(NAME, spec, FORWARD_PORT, None))),
        DesiredEntry::with_dependent(
            ManagedResource::ConfigMap(config_map(spec, data.clone())),
            deployment_id,
        ),
        DesiredEntry::present(ManagedResource::Deployment(deployment(spec, &data, endpoint, images))),
    ]
}

fn config_map(spec: &ValidatedSpec, data: BTreeMap<String, String>) -> ConfigMap {
    ConfigMap {
        metadata: meta::owned(CONFIG_MAP, spec),
        data: Some(data),
        ..ConfigMap::default()
    }
}

fn deployment(
    spec: &ValidatedSpec,
    data: &BTreeMap<String, String>,
    endpoint: &EndpointSpec,
    images: &ImageSettings,
) -> Deployment {
    let url = endpoint.url();
    let fingerprint = meta::fingerprint(
        data.iter()
            .flat_map(|(key, value)| [key.as_str(), value.as_str()])
            .chain([url.as_str(), images.aggregator.as_str()]),
    );

    Deployment {
        metadata: meta::workload(NAME, spec, fingerprint),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: meta::selector(NAME),
            template: pod::template(
                NAME,
                PodSpec {
                    containers: vec![Container {
                        name: NAME.to_string(),
                        image: Some(images.aggregator.clone()),
                        ports: Some(vec![pod::container_port(FORWARD_PORT)]),
                        env: Some(vec![
                            pod::env("FLUENTD_CONF", AGGREGATOR_FILE),
                            pod::env(SEARCH_HOST_ENV, endpoint.host.clone()),
                            pod::env(SEARCH_PORT_ENV, endpoint.port.to_string()),
                            pod::env(SEARCH_SCHEME_ENV, endpoint.scheme.as_str()),
                        ]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: CONFIG_VOLUME.to_string(),
                            mount_path: format!("/fluentd/etc/{AGGREGATOR_FILE}"),
                            sub_path: Some(AGGREGATOR_FILE.to_string()),
                            ..VolumeMount::default()
                        }]),
                        ..Container::default()
                    }],
                    volumes: Some(vec![pod::config_map_volume(CONFIG_VOLUME, CONFIG_MAP)]),
                    ..PodSpec::default()
                },
            ),
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}
