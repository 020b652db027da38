//! Desired-state builder.
//!
//! Pure: turns a validated specification and a resolved endpoint into the
//! ordered desired set. It never talks to the cluster.

use logpipe_compiler::RoutingSpec;
use logpipe_core::{EndpointSpec, ImageSettings, ValidatedSpec};
use tracing::debug;

use crate::desired::{DesiredEntry, DesiredSet, Level};
use crate::{aggregator, collector, dashboard, rbac, search};

#[derive(Debug, Clone, Default)]
pub struct DesiredStateBuilder {
    images: ImageSettings,
}

impl DesiredStateBuilder {
    pub const fn new(images: ImageSettings) -> Self {
        Self { images }
    }

    pub const fn images(&self) -> &ImageSettings {
        &self.images
    }

    /// Levels that do not depend on the search endpoint.
    pub fn foundation(&self, spec: &ValidatedSpec) -> DesiredSet {
        DesiredSet::new()
            .with_level(Level::Identity, self.identity(spec))
            .with_level(Level::SearchEngine, search::entries(spec, &self.images))
    }

    /// The complete desired set, parameterized by the search endpoint.
    pub fn build(&self, spec: &ValidatedSpec, endpoint: &EndpointSpec) -> DesiredSet {
        let routing = RoutingSpec::from_spec(spec);
        let set = self
            .foundation(spec)
            .with_level(
                Level::Aggregator,
                aggregator::entries(spec, &routing, endpoint, &self.images),
            )
            .with_level(Level::Collector, collector::entries(spec, &routing, &self.images))
            .with_level(Level::Dashboard, dashboard::entries(spec, endpoint, &self.images));

        debug!(
            pipeline = spec.name(),
            namespace = spec.namespace(),
            endpoint = %endpoint,
            resources = set.len(),
            "built desired set"
        );
        set
    }

    fn identity(&self, spec: &ValidatedSpec) -> Vec<DesiredEntry> {
        rbac::resources(spec).into_iter().map(DesiredEntry::present).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::unreachable)]
mod tests {
    use super::*;
    use crate::meta::{FINGERPRINT_ANNOTATION, MANAGED_BY, MANAGED_BY_LABEL};
    use crate::resource::{ManagedResource, ResourceId, ResourceKind};
    use logpipe_core::{
        LogPipeline, LogPipelineSpec, OutputSpec, ParserSpec, SearchEngineSpec, WatchRule, validate,
    };
    use pretty_assertions::assert_eq;

    fn spec_with(search: SearchEngineSpec, kibana: bool) -> ValidatedSpec {
        spec_in("logging", search, kibana)
    }

    /// Pipeline resource living in `resource_namespace`, targeting `logging`.
    fn spec_in(resource_namespace: &str, search: SearchEngineSpec, kibana: bool) -> ValidatedSpec {
        let mut pipeline = LogPipeline::new(
            "main",
            LogPipelineSpec {
                namespace: "logging".into(),
                es_kib_version: "7.10.2".into(),
                parsers: vec![ParserSpec::new("json", "^(?<log>.*)$")],
                watch: vec![WatchRule {
                    namespace: "checkout".into(),
                    parsers: vec!["json".into()],
                    outputs: vec![OutputSpec::search_engine("checkout-*")],
                    ..WatchRule::default()
                }],
                elasticsearch: search,
                kibana,
                ..LogPipelineSpec::default()
            },
        );
        pipeline.metadata.namespace = Some(resource_namespace.into());
        pipeline.metadata.uid = Some("6f1c2d3e-0000-4000-8000-000000000001".into());
        validate(&pipeline).expect("valid pipeline")
    }

    fn endpoint() -> EndpointSpec {
        EndpointSpec::new("10.96.0.2", 9200)
    }

    fn ids(set: &DesiredSet, level: Level) -> Vec<String> {
        set.level(level)
            .unwrap()
            .entries
            .iter()
            .map(|entry| {
                let id = entry.id();
                let state = if entry.is_present() { "+" } else { "-" };
                format!("{state}{} {}", id.kind, id.name)
            })
            .collect()
    }

    #[test]
    fn test_full_set_in_dependency_order() {
        let set = DesiredStateBuilder::default().build(
            &spec_with(SearchEngineSpec::self_managed(), true),
            &endpoint(),
        );

        let levels: Vec<Level> = set.levels().iter().map(|l| l.level).collect();
        assert_eq!(levels, Level::ALL.to_vec());
        assert_eq!(ids(&set, Level::Identity), vec![
            "+ServiceAccount fluent-bit",
            "+ClusterRole fluent-bit-read",
            "+ClusterRoleBinding fluent-bit-read",
        ]);
        assert_eq!(ids(&set, Level::SearchEngine), vec![
            "+Deployment elasticsearch",
            "+Service elasticsearch",
        ]);
        assert_eq!(ids(&set, Level::Aggregator), vec![
            "+Service fluentd",
            "+ConfigMap fluentd-config",
            "+Deployment fluentd",
        ]);
        assert_eq!(ids(&set, Level::Collector), vec![
            "+ConfigMap fluent-bit-config",
            "+DaemonSet fluent-bit",
        ]);
        assert_eq!(ids(&set, Level::Dashboard), vec!["+Deployment kibana", "+Service kibana"]);
    }

    #[test]
    fn test_disabled_components_are_absent() {
        let set = DesiredStateBuilder::default().build(
            &spec_with(SearchEngineSpec::external("es.example.com", 443), false),
            &endpoint(),
        );

        assert_eq!(ids(&set, Level::SearchEngine), vec![
            "-Deployment elasticsearch",
            "-Service elasticsearch",
        ]);
        assert_eq!(ids(&set, Level::Dashboard), vec!["-Deployment kibana", "-Service kibana"]);
    }

    #[test]
    fn test_foundation_stops_before_endpoint_consumers() {
        let set = DesiredStateBuilder::default()
            .foundation(&spec_with(SearchEngineSpec::self_managed(), true));
        let levels: Vec<Level> = set.levels().iter().map(|l| l.level).collect();
        assert_eq!(levels, Level::FOUNDATION.to_vec());
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = DesiredStateBuilder::default();
        let spec = spec_with(SearchEngineSpec::self_managed(), true);
        assert_eq!(builder.build(&spec, &endpoint()), builder.build(&spec, &endpoint()));
    }

    #[test]
    fn test_namespaced_objects_are_owned_and_labelled() {
        let set = DesiredStateBuilder::default().build(
            &spec_with(SearchEngineSpec::self_managed(), true),
            &endpoint(),
        );

        for resource in set.present() {
            let meta = resource.metadata();
            assert_eq!(
                meta.labels.as_ref().and_then(|l| l.get(MANAGED_BY_LABEL)).map(String::as_str),
                Some(MANAGED_BY)
            );
            let owned = meta.owner_references.as_ref().is_some_and(|refs| refs.len() == 1);
            assert_eq!(owned, resource.kind().is_namespaced(), "{}", resource.id());
            if resource.kind().is_workload() {
                assert!(resource.fingerprint().is_some(), "{}", resource.id());
            }
        }
    }

    #[test]
    fn test_pipeline_in_other_namespace_owns_nothing() {
        let set = DesiredStateBuilder::default().build(
            &spec_in("ops", SearchEngineSpec::self_managed(), true),
            &endpoint(),
        );

        for resource in set.present() {
            let meta = resource.metadata();
            if resource.kind().is_namespaced() {
                assert_eq!(meta.namespace.as_deref(), Some("logging"));
            }
            assert!(meta.owner_references.is_none(), "{}", resource.id());
        }
    }

    #[test]
    fn test_config_map_dependents_point_at_workloads() {
        let set = DesiredStateBuilder::default().build(
            &spec_with(SearchEngineSpec::self_managed(), false),
            &endpoint(),
        );

        let collector_config = ResourceId::namespaced(ResourceKind::ConfigMap, "fluent-bit-config", "logging");
        let Some(DesiredEntry::Present { dependent, .. }) = set.get(&collector_config) else {
            unreachable!("collector config map is desired");
        };
        assert_eq!(
            dependent.as_ref(),
            Some(&ResourceId::namespaced(ResourceKind::DaemonSet, "fluent-bit", "logging"))
        );
    }

    #[test]
    fn test_endpoint_change_only_touches_endpoint_consumers() {
        let builder = DesiredStateBuilder::default();
        let spec = spec_with(SearchEngineSpec::self_managed(), true);
        let before = builder.build(&spec, &endpoint());
        let after = builder.build(&spec, &EndpointSpec::new("10.96.0.9", 9200));

        let changed: Vec<String> = before
            .present()
            .zip(after.present())
            .filter(|(old, new)| old != new)
            .map(|(old, _)| old.id().to_string())
            .collect();
        assert_eq!(changed, vec!["Deployment logging/fluentd", "Deployment logging/kibana"]);

        let fluentd = after
            .present()
            .find(|r| r.id().name == "fluentd" && r.kind() == ResourceKind::Deployment)
            .unwrap();
        let ManagedResource::Deployment(deployment) = fluentd else {
            unreachable!("fluentd is a deployment");
        };
        let env = deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .env
            .clone()
            .unwrap();
        assert!(env.iter().any(|e| e.name == "ES_HOST" && e.value.as_deref() == Some("10.96.0.9")));
        assert!(
            deployment
                .metadata
                .annotations
                .as_ref()
                .is_some_and(|a| a.contains_key(FINGERPRINT_ANNOTATION))
        );
    }
}
