//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use logpipe_compiler::Dialect;

/// logpipe - log pipeline operator
#[derive(Parser, Debug)]
#[command(name = "logpipe")]
#[command(version)]
#[command(about = "Provision and converge a fluent-bit/fluentd/elasticsearch/kibana log pipeline")]
#[command(
    long_about = "logpipe watches a LogPipeline resource, compiles its routing rules into collector and aggregator configuration, and keeps the cluster's workloads in step with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile a LogPipeline resource until stopped
    Run {
        /// Name of the LogPipeline resource
        #[arg(short, long, default_value = "logpipe")]
        name: String,

        /// Namespace holding the LogPipeline resource
        #[arg(short = 'N', long, default_value = "logging")]
        namespace: String,

        /// Operator settings file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a LogPipeline manifest
    Validate {
        /// Manifest file (YAML)
        file: PathBuf,
    },

    /// Print the configuration compiled from a LogPipeline manifest
    Render {
        /// Manifest file (YAML)
        file: PathBuf,

        /// Only print one dialect
        #[arg(short, long, value_enum)]
        dialect: Option<DialectArg>,
    },

    /// Print the LogPipeline CustomResourceDefinition
    Crd,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectArg {
    Collector,
    Parsers,
    Aggregator,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Collector => Self::Collector,
            DialectArg::Parsers => Self::Parsers,
            DialectArg::Aggregator => Self::Aggregator,
        }
    }
}
