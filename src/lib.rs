#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # logpipe
//!
//! Operator that provisions a log pipeline (collector, aggregator, search
//! engine and dashboard) from a single `LogPipeline` resource and keeps it
//! converged.
//!
//! This library re-exports the workspace crates for convenience.

pub use logpipe_compiler;
pub use logpipe_core;
pub use logpipe_reconciler;
pub use logpipe_resources;

pub mod cli;
pub mod commands;
pub mod kube_store;

pub use kube_store::{KubeClusterStore, KubePipelineSource};
