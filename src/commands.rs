//! Offline commands: validate, render and print the CRD.
//!
//! None of these talk to a cluster; they work on a manifest file so a
//! pipeline can be checked before it is applied.

use std::path::Path;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use kube::CustomResourceExt;
use logpipe_compiler::{Dialect, RoutingSpec, compile};
use logpipe_core::{LogPipeline, ValidatedSpec, validate};

fn load(path: &Path) -> Result<ValidatedSpec> {
    let pipeline = LogPipeline::from_file(path)
        .with_context(|| format!("Failed to load pipeline manifest {}", path.display()))?;
    match validate(&pipeline) {
        Ok(spec) => Ok(spec),
        Err(errors) => bail!("{} is invalid:\n{errors}", path.display()),
    }
}

/// Validate a manifest and summarize what it provisions.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or fails validation.
pub fn validate_file(path: &Path) -> Result<String> {
    let spec = load(path)?;
    let search = if spec.search_engine_managed() {
        "self-managed".to_string()
    } else {
        spec.external_endpoint()
            .map_or_else(|| "external".to_string(), |endpoint| endpoint.url())
    };
    Ok(format!(
        "{} is valid: {} watch rule(s), search engine {search}, dashboard {}",
        path.display(),
        spec.watch_rules().len(),
        if spec.dashboard_enabled() { "enabled" } else { "disabled" },
    ))
}

/// Compile a manifest into one dialect, or into every file when `dialect` is `None`.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or fails validation.
pub fn render_file(path: &Path, dialect: Option<Dialect>) -> Result<String> {
    let spec = load(path)?;
    let routing = RoutingSpec::from_spec(&spec);
    Ok(match dialect {
        Some(dialect) => compile(dialect, &routing),
        None => Dialect::ALL
            .iter()
            .map(|&dialect| format!("# {}\n{}", dialect.file_name(), compile(dialect, &routing)))
            .join("\n"),
    })
}

/// The `LogPipeline` CustomResourceDefinition as YAML.
///
/// # Errors
///
/// Returns an error if the definition cannot be serialized.
pub fn crd() -> Result<String> {
    serde_yaml::to_string(&LogPipeline::crd()).context("Failed to serialize CustomResourceDefinition")
}
