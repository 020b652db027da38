//! Operator configuration: requeue timing and component images.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub reconcile: ReconcileSettings,

    #[serde(default)]
    pub images: ImageSettings,
}

impl OperatorConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))
    }
}

/// Requeue timing of the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Delay before re-checking a converged pipeline.
    #[serde(with = "duration_secs", default = "default_resync_interval")]
    pub resync_interval: Duration,

    /// Delay before the next pass after a mutation.
    #[serde(with = "duration_secs", default = "default_change_requeue")]
    pub change_requeue: Duration,

    /// Delay before retrying after a transient failure.
    #[serde(with = "duration_secs", default = "default_error_requeue")]
    pub error_requeue: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            resync_interval: default_resync_interval(),
            change_requeue: default_change_requeue(),
            error_requeue: default_error_requeue(),
        }
    }
}

/// Container images of the pipeline components.
///
/// The search engine and dashboard images are repositories; the tag comes
/// from the pipeline's `es-kib-version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_collector_image")]
    pub collector: String,

    #[serde(default = "default_aggregator_image")]
    pub aggregator: String,

    #[serde(default = "default_search_engine_repository")]
    pub search_engine: String,

    #[serde(default = "default_dashboard_repository")]
    pub dashboard: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            collector: default_collector_image(),
            aggregator: default_aggregator_image(),
            search_engine: default_search_engine_repository(),
            dashboard: default_dashboard_repository(),
        }
    }
}

impl ImageSettings {
    /// Search engine image at the given version.
    pub fn search_engine_image(&self, version: &str) -> String {
        format!("{}:{version}", self.search_engine)
    }

    /// Dashboard image at the given version.
    pub fn dashboard_image(&self, version: &str) -> String {
        format!("{}:{version}", self.dashboard)
    }
}

const fn default_resync_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_change_requeue() -> Duration {
    Duration::from_secs(5)
}

const fn default_error_requeue() -> Duration {
    Duration::from_secs(10)
}

fn default_collector_image() -> String {
    "fluent/fluent-bit:1.9".to_string()
}

fn default_aggregator_image() -> String {
    "fluent/fluentd-kubernetes-daemonset:v1.16-debian-elasticsearch7-1".to_string()
}

fn default_search_engine_repository() -> String {
    "docker.elastic.co/elasticsearch/elasticsearch-oss".to_string()
}

fn default_dashboard_repository() -> String {
    "docker.elastic.co/kibana/kibana-oss".to_string()
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
