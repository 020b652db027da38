//! Referential and structural validation of a `LogPipeline`.
//!
//! Every check runs; violations accumulate in check order. A successful
//! validation yields a [`ValidatedSpec`], a new value with defaults filled
//! in. The input resource is never modified.

use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use thiserror::Error;
use tracing::debug;

use crate::endpoint::{EndpointSpec, Scheme};
use crate::spec::{LogPipeline, LogPipelineSpec, WatchRule};

/// Log file of the collector when the pipeline leaves it empty.
pub const DEFAULT_COLLECTOR_LOGFILE: &str = "/var/log/fluentbit.log";

/// Target namespace when neither the pipeline nor the resource names one.
pub const DEFAULT_NAMESPACE: &str = "logging";

/// Built-in parser the collector applies to every tailed file.
pub const RUNTIME_PARSER: &str = "json_parser";

/// Namespace the pipeline may not be deployed into.
const FORBIDDEN_NAMESPACE: &str = "default";

/// A single human-readable validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("parsers definition missing")]
    MissingParsers,

    #[error("parser #{index} has no name")]
    UnnamedParser { index: usize },

    #[error("parser '{name}' is defined more than once")]
    DuplicateParser { name: String },

    #[error("parser '{name}' has an empty pattern")]
    EmptyParserPattern { name: String },

    #[error("parser name '{name}' is reserved for the built-in parser")]
    ReservedParserName { name: String },

    #[error("parser name {name:?} may only contain letters, digits, '_', '-' and '.'")]
    InvalidParserName { name: String },

    #[error("parser '{name}' pattern contains control characters")]
    InvalidParserPattern { name: String },

    #[error("target namespace {namespace:?} is not a valid namespace name")]
    InvalidTargetNamespace { namespace: String },

    #[error("target namespace must not be 'default'")]
    DefaultNamespace,

    #[error("collector-logfile contains control characters")]
    InvalidCollectorLogfile,

    #[error("es-kib-version missing")]
    MissingVersion,

    #[error("watch[{index}] is missing a namespace")]
    WatchMissingNamespace { index: usize },

    #[error("watch[{index}] ({namespace}) is missing parsers")]
    WatchMissingParsers { index: usize, namespace: String },

    #[error("watch[{index}] ({namespace}) is missing outputs")]
    WatchMissingOutputs { index: usize, namespace: String },

    #[error("parser '{name}' referenced by watch[{index}] is not defined")]
    UndefinedParser { index: usize, name: String },

    #[error("watch[{index}] namespace {namespace:?} is not a valid namespace name")]
    InvalidWatchNamespace { index: usize, namespace: String },

    #[error("watch[{index}] deployment {name:?} is not a valid deployment name")]
    InvalidDeployment { index: usize, name: String },

    #[error("watch[{index}] tag {tag:?} may only contain letters, digits, '_', '-' and '.'")]
    InvalidTag { index: usize, tag: String },

    #[error("watch[{index}] index-pattern {pattern:?} contains whitespace or control characters")]
    InvalidIndexPattern { index: usize, pattern: String },

    #[error("tag '{prefix}' is a prefix of tag '{tag}'; their routes would overlap")]
    TagPrefixConflict { tag: String, prefix: String },

    #[error("elasticsearch host missing (required when elasticsearch is not self-managed)")]
    SearchEngineHostMissing,

    #[error("elasticsearch port missing (required when elasticsearch is not self-managed)")]
    SearchEnginePortMissing,
}

/// Non-empty, ordered list of violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.violations.iter().join("\n"))
    }
}

impl std::error::Error for ValidationErrors {}

/// A specification that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSpec {
    name: String,
    namespace: String,
    owner: Option<OwnerReference>,
    spec: LogPipelineSpec,
}

impl ValidatedSpec {
    /// Name of the owning `LogPipeline`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace every pipeline component lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Controller reference to the owning `LogPipeline`, when it has a uid
    /// and lives in the target namespace.
    pub fn owner(&self) -> Option<&OwnerReference> {
        self.owner.as_ref()
    }

    pub fn spec(&self) -> &LogPipelineSpec {
        &self.spec
    }

    pub fn collector_logfile(&self) -> &str {
        &self.spec.collector_logfile
    }

    pub fn version(&self) -> &str {
        &self.spec.es_kib_version
    }

    pub fn watch_rules(&self) -> &[WatchRule] {
        &self.spec.watch
    }

    pub const fn search_engine_managed(&self) -> bool {
        self.spec.elasticsearch.required
    }

    pub const fn dashboard_enabled(&self) -> bool {
        self.spec.kibana
    }

    /// Statically configured endpoint of an external search engine.
    ///
    /// `None` when the search engine is self-managed; its endpoint is then
    /// discovered from the cluster.
    pub fn external_endpoint(&self) -> Option<EndpointSpec> {
        let search = &self.spec.elasticsearch;
        if search.required {
            return None;
        }
        let scheme = if search.https {
            Scheme::Https
        } else {
            Scheme::Http
        };
        search
            .port
            .map(|port| EndpointSpec::new(search.host.clone(), port).with_scheme(scheme))
    }
}

/// Validate a pipeline resource.
///
/// # Errors
///
/// Returns every violation found when the specification is not internally
/// consistent.
pub fn validate(pipeline: &LogPipeline) -> Result<ValidatedSpec, ValidationErrors> {
    let namespace = if pipeline.spec.namespace.is_empty() {
        pipeline
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    } else {
        pipeline.spec.namespace.clone()
    };

    let violations: Vec<Violation> = check_target_namespace(&namespace)
        .into_iter()
        .chain(check_collector_logfile(&pipeline.spec))
        .chain(check_parsers(&pipeline.spec))
        .chain(check_version(&pipeline.spec))
        .chain(check_watch_rules(&pipeline.spec))
        .chain(check_tag_prefixes(&pipeline.spec))
        .chain(check_search_engine(&pipeline.spec))
        .collect();

    if !violations.is_empty() {
        return Err(ValidationErrors { violations });
    }

    let mut spec = pipeline.spec.clone();
    if spec.collector_logfile.is_empty() {
        spec.collector_logfile = DEFAULT_COLLECTOR_LOGFILE.to_string();
    }
    spec.namespace.clone_from(&namespace);

    // Owner references cannot point across namespaces.
    let owner = if pipeline.namespace().as_deref() == Some(namespace.as_str()) {
        pipeline.controller_owner_ref(&())
    } else {
        None
    };

    debug!(
        pipeline = %pipeline.name_any(),
        namespace = %namespace,
        owned = owner.is_some(),
        "Pipeline validated"
    );
    Ok(ValidatedSpec {
        name: pipeline.name_any(),
        namespace,
        owner,
        spec,
    })
}

fn check_parsers(spec: &LogPipelineSpec) -> Vec<Violation> {
    if spec.parsers.is_empty() {
        return vec![Violation::MissingParsers];
    }

    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for (index, parser) in spec.parsers.iter().enumerate() {
        if parser.name.is_empty() {
            violations.push(Violation::UnnamedParser { index });
            continue;
        }
        if parser.name == RUNTIME_PARSER {
            violations.push(Violation::ReservedParserName {
                name: parser.name.clone(),
            });
        } else if !is_token(&parser.name) {
            violations.push(Violation::InvalidParserName {
                name: parser.name.clone(),
            });
        }
        if !seen.insert(parser.name.as_str()) {
            violations.push(Violation::DuplicateParser {
                name: parser.name.clone(),
            });
        }
        if parser.pattern.is_empty() {
            violations.push(Violation::EmptyParserPattern {
                name: parser.name.clone(),
            });
        } else if parser.pattern.chars().any(char::is_control) {
            violations.push(Violation::InvalidParserPattern {
                name: parser.name.clone(),
            });
        }
    }
    violations
}

fn check_target_namespace(namespace: &str) -> Option<Violation> {
    if namespace == FORBIDDEN_NAMESPACE {
        Some(Violation::DefaultNamespace)
    } else if is_dns_label(namespace) {
        None
    } else {
        Some(Violation::InvalidTargetNamespace {
            namespace: namespace.to_string(),
        })
    }
}

fn check_collector_logfile(spec: &LogPipelineSpec) -> Option<Violation> {
    spec.collector_logfile
        .chars()
        .any(char::is_control)
        .then_some(Violation::InvalidCollectorLogfile)
}

fn check_version(spec: &LogPipelineSpec) -> Option<Violation> {
    spec.es_kib_version
        .trim()
        .is_empty()
        .then_some(Violation::MissingVersion)
}

fn check_watch_rules(spec: &LogPipelineSpec) -> Vec<Violation> {
    let defined: HashSet<&str> = spec.parsers.iter().map(|p| p.name.as_str()).collect();

    spec.watch
        .iter()
        .enumerate()
        .flat_map(|(index, rule)| check_watch_rule(index, rule, &defined))
        .collect()
}

fn check_watch_rule(index: usize, rule: &WatchRule, defined: &HashSet<&str>) -> Vec<Violation> {
    let mut violations = Vec::new();

    if rule.namespace.is_empty() {
        violations.push(Violation::WatchMissingNamespace { index });
    } else if !is_dns_label(&rule.namespace) {
        violations.push(Violation::InvalidWatchNamespace {
            index,
            namespace: rule.namespace.clone(),
        });
    }
    if !rule.tag.is_empty() && !is_token(&rule.tag) {
        violations.push(Violation::InvalidTag {
            index,
            tag: rule.tag.clone(),
        });
    }
    violations.extend(
        rule.deployments
            .iter()
            .filter(|name| !is_dns_subdomain(name))
            .map(|name| Violation::InvalidDeployment {
                index,
                name: name.clone(),
            }),
    );
    if rule.parsers.is_empty() {
        violations.push(Violation::WatchMissingParsers {
            index,
            namespace: rule.namespace.clone(),
        });
    }
    if rule.outputs.is_empty() {
        violations.push(Violation::WatchMissingOutputs {
            index,
            namespace: rule.namespace.clone(),
        });
    }

    violations.extend(
        rule.parsers
            .iter()
            .unique()
            .filter(|name| !defined.contains(name.as_str()))
            .map(|name| Violation::UndefinedParser {
                index,
                name: name.clone(),
            }),
    );
    violations.extend(
        rule.outputs
            .iter()
            .filter(|output| {
                output
                    .index_pattern
                    .chars()
                    .any(|c| c.is_whitespace() || c.is_control())
            })
            .map(|output| Violation::InvalidIndexPattern {
                index,
                pattern: output.index_pattern.clone(),
            }),
    );
    violations
}

/// Aggregator matches are `<tag>**`, so a tag must not prefix another one.
fn check_tag_prefixes(spec: &LogPipelineSpec) -> Vec<Violation> {
    let tags: Vec<&str> = spec
        .watch
        .iter()
        .map(WatchRule::effective_tag)
        .filter(|tag| !tag.is_empty())
        .unique()
        .collect();

    tags.iter()
        .flat_map(|tag| {
            tags.iter()
                .filter(move |prefix| *prefix != tag && tag.starts_with(**prefix))
                .map(move |prefix| Violation::TagPrefixConflict {
                    tag: (*tag).to_string(),
                    prefix: (*prefix).to_string(),
                })
        })
        .collect()
}

/// Letters, digits, `_`, `-` and `.`; safe inside both config dialects.
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// RFC 1123 label, as required for namespace names.
fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
}

/// RFC 1123 subdomain, as required for deployment names.
fn is_dns_subdomain(value: &str) -> bool {
    value.len() <= 253 && value.split('.').all(is_dns_label)
}

fn check_search_engine(spec: &LogPipelineSpec) -> Vec<Violation> {
    let search = &spec.elasticsearch;
    if search.required {
        return Vec::new();
    }

    let mut violations = Vec::new();
    if search.host.trim().is_empty() {
        violations.push(Violation::SearchEngineHostMissing);
    }
    if search.port.is_none() {
        violations.push(Violation::SearchEnginePortMissing);
    }
    violations
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::spec::{OutputSpec, ParserSpec, SearchEngineSpec};

    fn valid_spec() -> LogPipelineSpec {
        LogPipelineSpec {
            es_kib_version: "7.17.0".into(),
            parsers: vec![ParserSpec::new("json", "^(?<log>.*)$")],
            watch: vec![WatchRule {
                namespace: "checkout".into(),
                tag: "checkout".into(),
                parsers: vec!["json".into()],
                outputs: vec![OutputSpec::search_engine("checkout-*")],
                ..WatchRule::default()
            }],
            elasticsearch: SearchEngineSpec::self_managed(),
            ..LogPipelineSpec::default()
        }
    }

    fn pipeline(spec: LogPipelineSpec) -> LogPipeline {
        let mut pipeline = LogPipeline::new("main", spec);
        pipeline.metadata.namespace = Some("observability".into());
        pipeline.metadata.uid = Some("0b4c5d6e-1111-2222-3333-444455556666".into());
        pipeline
    }

    #[test]
    fn test_valid_spec_fills_defaults() {
        let validated = validate(&pipeline(valid_spec())).unwrap();

        assert_eq!(validated.name(), "main");
        assert_eq!(validated.namespace(), "observability");
        assert_eq!(validated.spec().namespace, "observability");
        assert_eq!(validated.collector_logfile(), DEFAULT_COLLECTOR_LOGFILE);
        assert!(validated.owner().is_some());
        assert_eq!(validated.owner().map(|o| o.kind.as_str()), Some("LogPipeline"));
    }

    #[test]
    fn test_explicit_namespace_wins_over_resource_namespace() {
        let spec = LogPipelineSpec {
            namespace: "logging-system".into(),
            ..valid_spec()
        };
        let validated = validate(&pipeline(spec)).unwrap();
        assert_eq!(validated.namespace(), "logging-system");
        assert!(validated.owner().is_none());
    }

    #[test]
    fn test_owner_kept_when_target_is_resource_namespace() {
        let spec = LogPipelineSpec {
            namespace: "observability".into(),
            ..valid_spec()
        };
        let validated = validate(&pipeline(spec)).unwrap();
        assert_eq!(validated.owner().map(|o| o.name.as_str()), Some("main"));
    }

    #[test]
    fn test_namespace_falls_back_to_default() {
        let validated = validate(&LogPipeline::new("main", valid_spec())).unwrap();
        assert_eq!(validated.namespace(), DEFAULT_NAMESPACE);
        assert!(validated.owner().is_none());
    }

    #[test]
    fn test_validation_does_not_mutate_input() {
        let input = pipeline(valid_spec());
        let before = input.spec.clone();
        let _ = validate(&input);
        assert_eq!(input.spec, before);
    }

    #[test]
    fn test_undefined_parser_is_reported() {
        let mut spec = valid_spec();
        spec.watch[0].parsers = vec!["json".into(), "nginx".into()];

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(
            errors.violations(),
            &[Violation::UndefinedParser {
                index: 0,
                name: "nginx".into()
            }]
        );
    }

    #[test]
    fn test_violations_accumulate_in_check_order() {
        let spec = LogPipelineSpec {
            watch: vec![WatchRule::default()],
            elasticsearch: SearchEngineSpec::default(),
            ..LogPipelineSpec::default()
        };

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(
            errors.violations(),
            &[
                Violation::MissingParsers,
                Violation::MissingVersion,
                Violation::WatchMissingNamespace { index: 0 },
                Violation::WatchMissingParsers {
                    index: 0,
                    namespace: String::new()
                },
                Violation::WatchMissingOutputs {
                    index: 0,
                    namespace: String::new()
                },
                Violation::SearchEngineHostMissing,
                Violation::SearchEnginePortMissing,
            ]
        );
        assert_eq!(errors.to_string().lines().count(), 7);
    }

    #[test]
    fn test_duplicate_and_empty_parsers_are_rejected() {
        let mut spec = valid_spec();
        spec.parsers.push(ParserSpec::new("json", ""));

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert!(errors.contains(&Violation::DuplicateParser {
            name: "json".into()
        }));
        assert!(errors.contains(&Violation::EmptyParserPattern {
            name: "json".into()
        }));
    }

    #[test]
    fn test_empty_watch_list_is_valid() {
        let spec = LogPipelineSpec {
            watch: Vec::new(),
            ..valid_spec()
        };
        assert!(validate(&pipeline(spec)).is_ok());
    }

    #[test]
    fn test_external_search_engine_endpoint() {
        let spec = LogPipelineSpec {
            elasticsearch: SearchEngineSpec {
                https: true,
                ..SearchEngineSpec::external("es.internal", 9243)
            },
            ..valid_spec()
        };
        let validated = validate(&pipeline(spec)).unwrap();

        assert!(!validated.search_engine_managed());
        assert_eq!(
            validated.external_endpoint(),
            Some(EndpointSpec::new("es.internal", 9243).with_scheme(Scheme::Https))
        );
    }

    #[test]
    fn test_self_managed_search_engine_has_no_static_endpoint() {
        let validated = validate(&pipeline(valid_spec())).unwrap();
        assert!(validated.external_endpoint().is_none());
    }

    #[test]
    fn test_reserved_and_malformed_parser_names_are_rejected() {
        let mut spec = valid_spec();
        spec.parsers.push(ParserSpec::new(RUNTIME_PARSER, "^(?<log>.*)$"));
        spec.parsers.push(ParserSpec::new("two words", "^(?<log>.*)$"));
        spec.parsers.push(ParserSpec::new("multiline", "^(?<a>.*)\n[OUTPUT]$"));

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(
            errors.violations(),
            &[
                Violation::ReservedParserName {
                    name: RUNTIME_PARSER.into()
                },
                Violation::InvalidParserName {
                    name: "two words".into()
                },
                Violation::InvalidParserPattern {
                    name: "multiline".into()
                },
            ]
        );
    }

    #[test]
    fn test_tag_cannot_inject_config_sections() {
        let mut spec = valid_spec();
        spec.watch[0].tag = "shop\n[OUTPUT]\n    Name http\n    Match".into();

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert!(matches!(errors.violations(), [Violation::InvalidTag { index: 0, .. }]));
    }

    #[test]
    fn test_tag_with_whitespace_is_rejected() {
        let mut spec = valid_spec();
        spec.watch[0].tag = "a b".into();

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert!(errors.contains(&Violation::InvalidTag {
            index: 0,
            tag: "a b".into()
        }));
    }

    #[test]
    fn test_watch_namespace_and_deployments_must_be_dns_names() {
        let mut spec = valid_spec();
        spec.watch[0].namespace = "Checkout_Prod".into();
        spec.watch[0].deployments = vec!["api.v2".into(), "web server".into()];

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(
            errors.violations(),
            &[
                Violation::InvalidWatchNamespace {
                    index: 0,
                    namespace: "Checkout_Prod".into()
                },
                Violation::InvalidDeployment {
                    index: 0,
                    name: "web server".into()
                },
            ]
        );
    }

    #[test]
    fn test_index_pattern_with_whitespace_is_rejected() {
        let mut spec = valid_spec();
        spec.watch[0].outputs = vec![OutputSpec::search_engine("checkout *\n")];

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert!(matches!(errors.violations(), [Violation::InvalidIndexPattern { index: 0, .. }]));
    }

    #[test]
    fn test_tag_prefixing_another_tag_is_rejected() {
        let mut spec = valid_spec();
        let mut shopping = spec.watch[0].clone();
        spec.watch[0].tag = "shop".into();
        shopping.namespace = "shopping".into();
        shopping.tag = String::new();
        spec.watch.push(shopping);

        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(
            errors.violations(),
            &[Violation::TagPrefixConflict {
                tag: "shopping".into(),
                prefix: "shop".into()
            }]
        );
    }

    #[test]
    fn test_rules_sharing_a_tag_do_not_conflict() {
        let mut spec = valid_spec();
        let mut other = spec.watch[0].clone();
        other.namespace = "payments".into();
        spec.watch.push(other);

        assert!(validate(&pipeline(spec)).is_ok());
    }

    #[test]
    fn test_default_namespace_is_rejected() {
        let spec = LogPipelineSpec {
            namespace: "default".into(),
            ..valid_spec()
        };
        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(errors.violations(), &[Violation::DefaultNamespace]);

        let mut in_default = LogPipeline::new("main", valid_spec());
        in_default.metadata.namespace = Some("default".into());
        assert!(validate(&in_default).is_err());
    }

    #[test]
    fn test_malformed_target_namespace_is_rejected() {
        let spec = LogPipelineSpec {
            namespace: "Logging System".into(),
            ..valid_spec()
        };
        let errors = validate(&pipeline(spec)).unwrap_err();
        assert!(matches!(errors.violations(), [Violation::InvalidTargetNamespace { .. }]));
    }

    #[test]
    fn test_collector_logfile_with_newline_is_rejected() {
        let spec = LogPipelineSpec {
            collector_logfile: "/var/log/fb.log\n[OUTPUT]".into(),
            ..valid_spec()
        };
        let errors = validate(&pipeline(spec)).unwrap_err();
        assert_eq!(errors.violations(), &[Violation::InvalidCollectorLogfile]);
    }
}
