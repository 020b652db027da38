//! fluent-bit: rendered configuration and the per-node daemon set.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{ConfigMap, Container, PodSpec, Toleration, VolumeMount};
use logpipe_compiler::collector::COLLECTOR_HTTP_PORT;
use logpipe_compiler::{RoutingSpec, collector_files};
use logpipe_core::{ImageSettings, ValidatedSpec};

use crate::desired::DesiredEntry;
use crate::meta;
use crate::pod;
use crate::rbac::SERVICE_ACCOUNT;
use crate::resource::{ManagedResource, ResourceId, ResourceKind};

pub const NAME: &str = "fluent-bit";
pub const CONFIG_MAP: &str = "fluent-bit-config";

const VARLOG: &str = "varlog";
const VARLIBCONTAINERS: &str = "varlibcontainers";
const CONTAINERS_DIR: &str = "/var/lib/docker/containers";

pub fn entries(spec: &ValidatedSpec, routing: &RoutingSpec, images: &ImageSettings) -> Vec<DesiredEntry> {
    let data = collector_files(routing);
    let daemon_set_id = ResourceId::namespaced(ResourceKind::DaemonSet, NAME, spec.namespace());
    vec![
        DesiredEntry::with_dependent(
            ManagedResource::ConfigMap(config_map(spec, data.clone())),
            daemon_set_id,
        ),
        DesiredEntry::present(ManagedResource::DaemonSet(daemon_set(spec, &data, images))),
    ]
}

fn config_map(spec: &ValidatedSpec, data: BTreeMap<String, String>) -> ConfigMap {
    ConfigMap {
        metadata: meta::owned(CONFIG_MAP, spec),
        data: Some(data),
        ..ConfigMap::default()
    }
}

fn daemon_set(spec: &ValidatedSpec, data: &BTreeMap<String, String>, images: &ImageSettings) -> DaemonSet {
    let fingerprint = meta::fingerprint(
        data.iter()
            .flat_map(|(key, value)| [key.as_str(), value.as_str()])
            .chain([images.collector.as_str()]),
    );

    DaemonSet {
        metadata: meta::workload(NAME, spec, fingerprint),
        spec: Some(DaemonSetSpec {
            selector: meta::selector(NAME),
            template: pod::template(
                NAME,
                PodSpec {
                    service_account_name: Some(SERVICE_ACCOUNT.to_string()),
                    containers: vec![Container {
                        name: NAME.to_string(),
                        image: Some(images.collector.clone()),
                        ports: Some(vec![pod::container_port(COLLECTOR_HTTP_PORT)]),
                        volume_mounts: Some(vec![
                            mount(VARLOG, "/var/log", false),
                            mount(CONFIG_MAP, "/fluent-bit/etc/", false),
                            mount(VARLIBCONTAINERS, CONTAINERS_DIR, true),
                        ]),
                        ..Container::default()
                    }],
                    volumes: Some(vec![
                        pod::host_path_volume(VARLOG, "/var/log"),
                        pod::config_map_volume(CONFIG_MAP, CONFIG_MAP),
                        pod::host_path_volume(VARLIBCONTAINERS, CONTAINERS_DIR),
                    ]),
                    tolerations: Some(vec![Toleration {
                        key: Some("node-role.kubernetes.io/master".into()),
                        operator: Some("Exists".into()),
                        effect: Some("NoSchedule".into()),
                        ..Toleration::default()
                    }]),
                    ..PodSpec::default()
                },
            ),
            ..DaemonSetSpec::default()
        }),
        ..DaemonSet::default()
    }
}

fn mount(name: &str, path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: read_only.then_some(true),
        ..VolumeMount::default()
    }
}
