//! Identity of the collector: service account and read access to pod metadata.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use logpipe_core::ValidatedSpec;

use crate::meta;
use crate::resource::ManagedResource;

pub const SERVICE_ACCOUNT: &str = "fluent-bit";
pub const CLUSTER_ROLE: &str = "fluent-bit-read";

pub fn resources(spec: &ValidatedSpec) -> Vec<ManagedResource> {
    vec![
        ManagedResource::ServiceAccount(service_account(spec)),
        ManagedResource::ClusterRole(cluster_role()),
        ManagedResource::ClusterRoleBinding(cluster_role_binding(spec)),
    ]
}

fn service_account(spec: &ValidatedSpec) -> ServiceAccount {
    ServiceAccount {
        metadata: meta::owned(SERVICE_ACCOUNT, spec),
        ..ServiceAccount::default()
    }
}

fn cluster_role() -> ClusterRole {
    ClusterRole {
        metadata: meta::cluster(CLUSTER_ROLE),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["namespaces".into(), "pods".into()]),
            verbs: vec!["get".into(), "list".into(), "watch".into()],
            ..PolicyRule::default()
        }]),
        ..ClusterRole::default()
    }
}

fn cluster_role_binding(spec: &ValidatedSpec) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: meta::cluster(CLUSTER_ROLE),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".into(),
            kind: "ClusterRole".into(),
            name: CLUSTER_ROLE.into(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".into(),
            name: SERVICE_ACCOUNT.into(),
            namespace: Some(spec.namespace().to_string()),
            ..Subject::default()
        }]),
    }
}
