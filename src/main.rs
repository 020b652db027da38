//! # logpipe - Operator Entry Point
//!
//! ## Run Sequence
//!
//! 1. **Settings** - Load operator settings, or fall back to defaults
//! 2. **Cluster Client** - Connect using the ambient kubeconfig or service account
//! 3. **Reconciler** - Wire the desired-state builder to the cluster store
//! 4. **Reconciliation Loop** - Converge the named `LogPipeline` until Ctrl+C

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use logpipe::cli::{Cli, Commands};
use logpipe::commands;
use logpipe::{KubeClusterStore, KubePipelineSource};
use logpipe_core::OperatorConfig;
use logpipe_reconciler::{
    LoopConfig, LoopStopper, ReconcilerBuilder, ReconcilerConfig, ReconciliationLoop, TracingClusterStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Commands::Run { name, namespace, config } => run(&name, &namespace, config.as_deref()).await,
        Commands::Validate { file } => {
            println!("{}", commands::validate_file(&file)?);
            Ok(())
        }
        Commands::Render { file, dialect } => {
            print!("{}", commands::render_file(&file, dialect.map(Into::into))?);
            Ok(())
        }
        Commands::Crd => {
            print!("{}", commands::crd()?);
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(name: &str, namespace: &str, config: Option<&Path>) -> Result<()> {
    let settings = match config {
        Some(path) => OperatorConfig::from_file(path)
            .with_context(|| format!("Failed to load operator settings from {}", path.display()))?,
        None => OperatorConfig::default(),
    };

    let client = kube::Client::try_default()
        .await
        .context("Failed to create cluster client. Check your kubeconfig or in-cluster service account")?;

    let store = Arc::new(TracingClusterStore::new(KubeClusterStore::new(client.clone())));
    let reconciler = ReconcilerBuilder::new()
        .with_store(store)
        .with_images(settings.images.clone())
        .with_config(ReconcilerConfig::from(&settings.reconcile))
        .build()
        .context("Failed to build reconciler")?;
    let source = Arc::new(KubePipelineSource::new(client, namespace, name));

    let mut reconciliation = ReconciliationLoop::new(
        Arc::new(reconciler),
        source,
        LoopConfig::from(&settings.reconcile),
    );
    tokio::spawn(stop_on_shutdown(reconciliation.stopper()));

    info!(pipeline = name, namespace, "logpipe operator started");
    reconciliation.run().await.context("Reconciliation loop failed")?;
    info!("logpipe operator stopped");
    Ok(())
}

/// Wait for Ctrl+C, then stop the loop.
async fn stop_on_shutdown(stopper: LoopStopper) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, stopping reconciliation");
            stopper.stop();
        }
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
