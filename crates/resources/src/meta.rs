//! Object metadata shared by every managed resource.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use logpipe_core::ValidatedSpec;
use sha2::{Digest, Sha256};

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "logpipe";
pub const APP_LABEL: &str = "app";

/// Hash of the inputs a workload was built from.
pub const FINGERPRINT_ANNOTATION: &str = "logpipe.io/fingerprint";

fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string())])
}

/// Selector labels of a component's pods.
pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app.to_string())])
}

pub fn selector(app: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(app_labels(app)),
        ..LabelSelector::default()
    }
}

/// Metadata of a namespaced object owned by the pipeline.
pub fn owned(name: &str, spec: &ValidatedSpec) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(spec.namespace().to_string()),
        labels: Some(managed_labels()),
        owner_references: spec.owner().map(|owner| vec![owner.clone()]),
        ..ObjectMeta::default()
    }
}

/// Metadata of a cluster-scoped object. Owner references cannot cross
/// from cluster scope into a namespace, so none is set.
pub fn cluster(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(managed_labels()),
        ..ObjectMeta::default()
    }
}

/// Owned metadata of a component with app labels and a fingerprint.
pub fn workload(name: &str, spec: &ValidatedSpec, fingerprint: String) -> ObjectMeta {
    let mut meta = owned(name, spec);
    if let Some(labels) = meta.labels.as_mut() {
        labels.extend(app_labels(name));
    }
    meta.annotations = Some(BTreeMap::from([(FINGERPRINT_ANNOTATION.to_string(), fingerprint)]));
    meta
}

/// Hex SHA-256 over length-prefixed parts, so part boundaries matter.
pub fn fingerprint<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.len().to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
