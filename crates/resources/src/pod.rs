//! Building blocks for pod templates and the services in front of them.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, ContainerPort, EnvVar, HostPathVolumeSource, PodSpec, PodTemplateSpec,
    Service, ServicePort, ServiceSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use logpipe_core::ValidatedSpec;

use crate::meta;

pub fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..EnvVar::default()
    }
}

pub fn container_port(port: u16) -> ContainerPort {
    ContainerPort {
        container_port: i32::from(port),
        ..ContainerPort::default()
    }
}

pub fn host_path_volume(name: &str, path: &str) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            ..HostPathVolumeSource::default()
        }),
        ..Volume::default()
    }
}

pub fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    }
}

/// Pod template labelled for the component's selector.
pub fn template(app: &str, spec: PodSpec) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(meta::app_labels(app)),
            ..ObjectMeta::default()
        }),
        spec: Some(spec),
    }
}

/// Service selecting the component's pods on a single port.
pub fn service(app: &str, spec: &ValidatedSpec, port: u16, service_type: Option<&str>) -> Service {
    Service {
        metadata: meta::owned(app, spec),
        spec: Some(ServiceSpec {
            selector: Some(meta::app_labels(app)),
            ports: Some(vec![ServicePort {
                name: Some(app.to_string()),
                port: i32::from(port),
                target_port: Some(IntOrString::Int(i32::from(port))),
                ..ServicePort::default()
            }]),
            type_: service_type.map(str::to_string),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
