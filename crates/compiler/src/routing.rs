//! Canonical routing table derived from a validated specification.
//!
//! Watch rules are grouped by tag in order of first appearance. Globs,
//! parser references and identical outputs are de-duplicated, parser
//! patterns are resolved from the global set, and empty index patterns
//! default to the tag. The caller's specification is left untouched.

use itertools::Itertools;
use logpipe_core::{OutputSpec, ParserSpec, SinkType, ValidatedSpec, WatchRule};

/// Directory the container runtime writes pod logs to.
pub const CONTAINER_LOG_DIR: &str = "/var/log/containers";

/// Log level of the collector process.
pub const COLLECTOR_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSpec {
    pub log_level: String,
    pub log_file: String,
    pub include_k8s_metadata: bool,
    /// Global parser set, in declaration order.
    pub parsers: Vec<ParserSpec>,
    pub routes: Vec<Route>,
}

/// Everything the pipeline does with records carrying one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub tag: String,
    pub paths: Vec<String>,
    pub parsers: Vec<ParserSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl RoutingSpec {
    pub fn from_spec(validated: &ValidatedSpec) -> Self {
        let spec = validated.spec();
        let tags: Vec<&str> = spec.watch.iter().map(WatchRule::effective_tag).unique().collect();

        let routes = tags
            .into_iter()
            .map(|tag| {
                let rules: Vec<&WatchRule> = spec
                    .watch
                    .iter()
                    .filter(|rule| rule.effective_tag() == tag)
                    .collect();
                Route::from_rules(tag, &rules, &spec.parsers)
            })
            .collect();

        Self {
            log_level: COLLECTOR_LOG_LEVEL.to_string(),
            log_file: validated.collector_logfile().to_string(),
            include_k8s_metadata: spec.include_k8s_metadata,
            parsers: spec.parsers.clone(),
            routes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Route {
    fn from_rules(tag: &str, rules: &[&WatchRule], parsers: &[ParserSpec]) -> Self {
        let paths = rules.iter().flat_map(|rule| source_globs(rule)).unique().collect();

        let parsers = rules
            .iter()
            .flat_map(|rule| rule.parsers.iter())
            .unique()
            .filter_map(|name| parsers.iter().find(|p| &p.name == name).cloned())
            .collect();

        let mut outputs: Vec<OutputSpec> = Vec::new();
        for output in rules.iter().flat_map(|rule| rule.outputs.iter()) {
            let output = resolve_output(tag, output);
            if !outputs.contains(&output) {
                outputs.push(output);
            }
        }

        Self {
            tag: tag.to_string(),
            paths,
            parsers,
            outputs,
        }
    }

    /// Collector tag pattern; the suffix lets one tag span many paths.
    pub fn tag_pattern(&self) -> String {
        format!("{}.*", self.tag)
    }
}

/// Tail globs for a watch rule.
pub fn source_globs(rule: &WatchRule) -> Vec<String> {
    if rule.deployments.is_empty() {
        vec![format!("{CONTAINER_LOG_DIR}/*_{}_*", rule.namespace)]
    } else {
        rule.deployments
            .iter()
            .map(|deployment| format!("{CONTAINER_LOG_DIR}/{deployment}*_{}_*", rule.namespace))
            .collect()
    }
}

fn resolve_output(tag: &str, output: &OutputSpec) -> OutputSpec {
    match output.sink {
        SinkType::SearchEngine if output.index_pattern.is_empty() => OutputSpec::search_engine(tag),
        _ => output.clone(),
    }
}
