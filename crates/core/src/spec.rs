//! The `LogPipeline` custom resource.
//!
//! A single declarative object describes the whole pipeline: which namespaces
//! the collector tails, which parsers it applies, where the aggregator routes
//! records, and whether the search engine and dashboard are self-managed.

use std::fmt;
use std::path::Path;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Desired state of a log pipeline.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "logging.logpipe.io",
    version = "v1alpha1",
    kind = "LogPipeline",
    plural = "logpipelines",
    shortname = "lp",
    namespaced
)]
#[serde(rename_all = "kebab-case")]
pub struct LogPipelineSpec {
    /// Namespace the pipeline components are provisioned into.
    #[serde(default)]
    pub namespace: String,

    /// Log file of the collector process itself.
    #[serde(default)]
    pub collector_logfile: String,

    /// Enrich records with pod metadata before forwarding.
    #[serde(default)]
    pub include_k8s_metadata: bool,

    /// Image tag shared by the search engine and dashboard.
    #[serde(default)]
    pub es_kib_version: String,

    /// Global parser set, referenced by name from watch rules.
    #[serde(default)]
    pub parsers: Vec<ParserSpec>,

    /// What to collect and where to send it.
    #[serde(default)]
    pub watch: Vec<WatchRule>,

    /// Search engine placement.
    #[serde(default)]
    pub elasticsearch: SearchEngineSpec,

    /// Provision the dashboard.
    #[serde(default)]
    pub kibana: bool,
}

impl LogPipeline {
    /// Parse a `LogPipeline` manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid manifest.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::yaml_parse_failed(e.to_string()))
    }

    /// Load a `LogPipeline` manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_yaml(&content)
    }
}

/// A named regex parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParserSpec {
    pub name: String,
    #[serde(default)]
    pub pattern: String,
}

impl ParserSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// A namespace (optionally narrowed to deployments) to tail under one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct WatchRule {
    pub namespace: String,

    /// Routing tag; the namespace is used when empty.
    #[serde(default)]
    pub tag: String,

    #[serde(default)]
    pub deployments: Vec<String>,

    /// Names from the global parser set, applied in order.
    #[serde(default)]
    pub parsers: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

impl WatchRule {
    /// Tag the rule routes under.
    pub fn effective_tag(&self) -> &str {
        if self.tag.is_empty() {
            &self.namespace
        } else {
            &self.tag
        }
    }
}

/// A destination for records carrying a given tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct OutputSpec {
    #[serde(rename = "type")]
    pub sink: SinkType,
    #[serde(default)]
    pub index_pattern: String,
}

impl OutputSpec {
    pub fn search_engine(index_pattern: impl Into<String>) -> Self {
        Self {
            sink: SinkType::SearchEngine,
            index_pattern: index_pattern.into(),
        }
    }

    pub fn stdout() -> Self {
        Self {
            sink: SinkType::Stdout,
            index_pattern: String::new(),
        }
    }
}

/// Closed set of sink types understood by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SinkType {
    #[serde(rename = "elasticsearch", alias = "search-engine")]
    SearchEngine,
    #[serde(rename = "stdout")]
    Stdout,
}

impl SinkType {
    /// Plugin identifier in the aggregator dialect.
    pub const fn plugin(self) -> &'static str {
        match self {
            Self::SearchEngine => "elasticsearch",
            Self::Stdout => "stdout",
        }
    }
}

impl fmt::Display for SinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plugin())
    }
}

/// Whether the search engine is provisioned by the operator or external.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchEngineSpec {
    /// Provision and manage the search engine in the target namespace.
    #[serde(default)]
    pub required: bool,

    /// External host, used when not self-managed.
    #[serde(default)]
    pub host: String,

    /// External port, used when not self-managed.
    #[serde(default)]
    pub port: Option<u16>,

    /// External endpoint speaks https.
    #[serde(default)]
    pub https: bool,
}

impl SearchEngineSpec {
    pub fn self_managed() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn external(host: impl Into<String>, port: u16) -> Self {
        Self {
            required: false,
            host: host.into(),
            port: Some(port),
            https: false,
        }
    }
}
