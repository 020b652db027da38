//! Typed descriptors of the objects a pipeline owns.
//!
//! [`ManagedResource`] is a closed set: one variant per object kind. Drift
//! detection and store dispatch match on the variant instead of inspecting
//! types at runtime.

use std::fmt;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::meta::{FINGERPRINT_ANNOTATION, MANAGED_BY, MANAGED_BY_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    ConfigMap,
    DaemonSet,
    Deployment,
    Service,
}

impl ResourceKind {
    pub const fn is_namespaced(self) -> bool {
        !matches!(self, Self::ClusterRole | Self::ClusterRoleBinding)
    }

    /// Workloads run pods and are recreated when their inputs change.
    pub const fn is_workload(self) -> bool {
        matches!(self, Self::DaemonSet | Self::Deployment)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceAccount => "ServiceAccount",
            Self::ClusterRole => "ClusterRole",
            Self::ClusterRoleBinding => "ClusterRoleBinding",
            Self::ConfigMap => "ConfigMap",
            Self::DaemonSet => "DaemonSet",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resource: kind, name and (for namespaced kinds) namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceId {
    pub fn namespaced(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {namespace}/{}", self.kind, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Difference between a desired resource and what the cluster holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Drift {
    /// Observed content satisfies the desired content.
    None,
    /// The config payload differs. Carries the observed object with the
    /// desired payload applied, ready for an in-place update.
    Payload(ManagedResource),
    /// A workload was built from different inputs and must be recreated.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManagedResource {
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    ConfigMap(ConfigMap),
    DaemonSet(DaemonSet),
    Deployment(Deployment),
    Service(Service),
}

impl ManagedResource {
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::ServiceAccount(_) => ResourceKind::ServiceAccount,
            Self::ClusterRole(_) => ResourceKind::ClusterRole,
            Self::ClusterRoleBinding(_) => ResourceKind::ClusterRoleBinding,
            Self::ConfigMap(_) => ResourceKind::ConfigMap,
            Self::DaemonSet(_) => ResourceKind::DaemonSet,
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::Service(_) => ResourceKind::Service,
        }
    }

    pub const fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::ServiceAccount(r) => &r.metadata,
            Self::ClusterRole(r) => &r.metadata,
            Self::ClusterRoleBinding(r) => &r.metadata,
            Self::ConfigMap(r) => &r.metadata,
            Self::DaemonSet(r) => &r.metadata,
            Self::Deployment(r) => &r.metadata,
            Self::Service(r) => &r.metadata,
        }
    }

    pub const fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::ServiceAccount(r) => &mut r.metadata,
            Self::ClusterRole(r) => &mut r.metadata,
            Self::ClusterRoleBinding(r) => &mut r.metadata,
            Self::ConfigMap(r) => &mut r.metadata,
            Self::DaemonSet(r) => &mut r.metadata,
            Self::Deployment(r) => &mut r.metadata,
            Self::Service(r) => &mut r.metadata,
        }
    }

    pub fn id(&self) -> ResourceId {
        let meta = self.metadata();
        ResourceId {
            kind: self.kind(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
        }
    }

    /// Hash of the inputs a workload was built from.
    pub fn fingerprint(&self) -> Option<&str> {
        self.metadata()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(FINGERPRINT_ANNOTATION))
            .map(String::as_str)
    }

    /// Carries the label this operator stamps on everything it creates.
    pub fn is_managed(&self) -> bool {
        self.metadata()
            .labels
            .as_ref()
            .and_then(|labels| labels.get(MANAGED_BY_LABEL))
            .is_some_and(|value| value == MANAGED_BY)
    }

    /// Compare against the observed object with the same identity.
    ///
    /// Only config payloads and workload fingerprints are compared; fields
    /// the cluster defaults or assigns never count as drift.
    pub fn drift(&self, observed: &Self) -> Drift {
        match (self, observed) {
            (Self::ConfigMap(desired), Self::ConfigMap(current)) if desired.data != current.data => {
                Drift::Payload(Self::ConfigMap(ConfigMap {
                    data: desired.data.clone(),
                    ..current.clone()
                }))
            }
            (Self::DaemonSet(_), Self::DaemonSet(_)) | (Self::Deployment(_), Self::Deployment(_))
                if self.fingerprint() != observed.fingerprint() =>
            {
                Drift::Stale
            }
            _ => Drift::None,
        }
    }

    /// Cluster address and first port of a Service, once assigned.
    pub fn service_address(&self) -> Option<(String, u16)> {
        let Self::Service(service) = self else {
            return None;
        };
        let spec = service.spec.as_ref()?;
        let host = spec
            .cluster_ip
            .as_ref()
            .filter(|ip| !ip.is_empty() && ip.as_str() != "None")?;
        let port = spec.ports.as_ref()?.first()?.port;
        u16::try_from(port).ok().map(|port| (host.clone(), port))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreachable)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("fluent-bit-config".into()),
                namespace: Some("logging".into()),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ConfigMap::default()
        }
    }

    fn deployment(fingerprint: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("fluentd".into()),
                namespace: Some("logging".into()),
                annotations: Some(BTreeMap::from([(
                    FINGERPRINT_ANNOTATION.to_string(),
                    fingerprint.to_string(),
                )])),
                ..ObjectMeta::default()
            },
            ..Deployment::default()
        }
    }

    #[test]
    fn test_id_reflects_kind_name_and_namespace() {
        let resource = ManagedResource::ConfigMap(config_map(&[]));
        assert_eq!(
            resource.id(),
            ResourceId::namespaced(ResourceKind::ConfigMap, "fluent-bit-config", "logging")
        );
        assert_eq!(resource.id().to_string(), "ConfigMap logging/fluent-bit-config");
    }

    #[test]
    fn test_config_map_payload_drift_keeps_observed_metadata() {
        let desired = ManagedResource::ConfigMap(config_map(&[("parsers.conf", "new")]));
        let mut observed_map = config_map(&[("parsers.conf", "old")]);
        observed_map.metadata.resource_version = Some("42".into());
        let observed = ManagedResource::ConfigMap(observed_map);

        let Drift::Payload(ManagedResource::ConfigMap(updated)) = desired.drift(&observed) else {
            unreachable!("expected payload drift");
        };
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(
            updated.data.unwrap().get("parsers.conf").map(String::as_str),
            Some("new")
        );
    }

    #[test]
    fn test_managed_label_is_recognized() {
        let unlabelled = ManagedResource::ConfigMap(config_map(&[]));
        assert!(!unlabelled.is_managed());

        let mut labelled = config_map(&[]);
        labelled.metadata.labels = Some(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            MANAGED_BY.to_string(),
        )]));
        assert!(ManagedResource::ConfigMap(labelled).is_managed());
    }

    #[test]
    fn test_identical_payload_is_not_drift() {
        let desired = ManagedResource::ConfigMap(config_map(&[("fluent.conf", "x")]));
        assert_eq!(desired.drift(&desired.clone()), Drift::None);
    }

    #[test]
    fn test_workload_fingerprint_mismatch_is_stale() {
        let desired = ManagedResource::Deployment(deployment("abc"));
        assert_eq!(desired.drift(&ManagedResource::Deployment(deployment("def"))), Drift::Stale);
        assert_eq!(desired.drift(&ManagedResource::Deployment(deployment("abc"))), Drift::None);
    }

    #[test]
    fn test_service_address_requires_assigned_ip() {
        let mut service = Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    port: 9200,
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        };
        assert_eq!(ManagedResource::Service(service.clone()).service_address(), None);

        if let Some(spec) = service.spec.as_mut() {
            spec.cluster_ip = Some("10.96.0.12".into());
        }
        assert_eq!(
            ManagedResource::Service(service).service_address(),
            Some(("10.96.0.12".to_string(), 9200))
        );
    }
}
