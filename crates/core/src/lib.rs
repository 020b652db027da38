//! Specification model of a log pipeline.
//!
//! - [`spec`]: the `LogPipeline` custom resource
//! - [`validator`]: referential checks producing a [`ValidatedSpec`]
//! - [`endpoint`]: where the search engine is reached
//! - [`config`]: operator-level settings (timing, images)

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod spec;
pub mod validator;

pub use config::{ImageSettings, OperatorConfig, ReconcileSettings};
pub use endpoint::{EndpointSpec, Scheme};
pub use error::{Error, Result};
pub use spec::{LogPipeline, LogPipelineSpec, OutputSpec, ParserSpec, SearchEngineSpec, SinkType, WatchRule};
pub use validator::{RUNTIME_PARSER, ValidatedSpec, ValidationErrors, Violation, validate};
