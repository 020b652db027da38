//! Continuous reconciliation loop.
//!
//! Runs passes serially for one pipeline, sleeping whatever delay the last
//! pass asked for. Errors never stop the loop; only the stopper does.

use std::sync::Arc;
use std::time::Duration;

use logpipe_core::{LogPipeline, LogPipelineSpec, ReconcileSettings};
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::types::ReconcileResult;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Delay before re-checking when there is nothing to do.
    pub resync_interval: Duration,
    /// Delay before retrying after a transient failure.
    pub error_requeue: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&ReconcileSettings::default())
    }
}

impl From<&ReconcileSettings> for LoopConfig {
    fn from(settings: &ReconcileSettings) -> Self {
        Self {
            resync_interval: settings.resync_interval,
            error_requeue: settings.error_requeue,
        }
    }
}

/// Where the loop reads the current pipeline from.
#[async_trait::async_trait]
pub trait PipelineSource: Send + Sync {
    /// Fetch the pipeline; `None` when it does not exist.
    async fn fetch(&self) -> Result<Option<LogPipeline>>;
}

/// Simple in-memory pipeline source.
#[derive(Default)]
pub struct InMemoryPipelineSource {
    pipeline: RwLock<Option<LogPipeline>>,
}

impl InMemoryPipelineSource {
    pub fn new(pipeline: Option<LogPipeline>) -> Self {
        Self {
            pipeline: RwLock::new(pipeline),
        }
    }

    pub async fn update(&self, pipeline: Option<LogPipeline>) {
        *self.pipeline.write().await = pipeline;
    }

    /// Edit the stored pipeline in place, if there is one.
    pub async fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut LogPipeline),
    {
        if let Some(pipeline) = self.pipeline.write().await.as_mut() {
            f(pipeline);
        }
    }
}

#[async_trait::async_trait]
impl PipelineSource for InMemoryPipelineSource {
    async fn fetch(&self) -> Result<Option<LogPipeline>> {
        Ok(self.pipeline.read().await.clone())
    }
}

/// What a single loop iteration did.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// A reconciliation pass ran.
    Reconciled(ReconcileResult),
    /// The pipeline does not exist.
    Missing,
    /// The pipeline failed validation.
    Rejected,
    /// The pipeline is unchanged since it was rejected.
    Skipped,
    /// The pass aborted on a transient error.
    Failed(Error),
}

impl PassOutcome {
    pub fn requeue_after(&self, config: &LoopConfig) -> Duration {
        match self {
            Self::Reconciled(result) => result.requeue_after,
            Self::Missing | Self::Rejected | Self::Skipped => config.resync_interval,
            Self::Failed(_) => config.error_requeue,
        }
    }

    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Reconciled(result) if result.converged)
    }
}

/// Continuous reconciliation loop.
pub struct ReconciliationLoop {
    reconciler: Arc<Reconciler>,
    source: Arc<dyn PipelineSource>,
    config: LoopConfig,
    /// Last specification that failed validation.
    rejected: Option<LogPipelineSpec>,
    stop_rx: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl ReconciliationLoop {
    pub fn new(reconciler: Arc<Reconciler>, source: Arc<dyn PipelineSource>, config: LoopConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            reconciler,
            source,
            config,
            rejected: None,
            stop_rx,
            stop_tx,
        }
    }

    /// Run until stopped.
    ///
    /// # Errors
    ///
    /// Never returns an error today; pass failures are logged and retried.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            resync_secs = self.config.resync_interval.as_secs(),
            error_requeue_secs = self.config.error_requeue.as_secs(),
            "Starting reconciliation loop"
        );

        loop {
            if *self.stop_rx.borrow() {
                info!("Reconciliation loop stopped");
                return Ok(());
            }

            let outcome = self.reconcile_once().await;
            let delay = outcome.requeue_after(&self.config);
            debug!(delay_ms = delay.as_millis(), "Requeueing");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        info!("Reconciliation loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run a single iteration: fetch, skip if known-bad, reconcile.
    pub async fn reconcile_once(&mut self) -> PassOutcome {
        let pipeline = match self.source.fetch().await {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => {
                debug!("Pipeline not found");
                return PassOutcome::Missing;
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch pipeline");
                return PassOutcome::Failed(e);
            }
        };

        if self.rejected.as_ref() == Some(&pipeline.spec) {
            debug!("Pipeline unchanged since rejection, skipping");
            return PassOutcome::Skipped;
        }

        match self.reconciler.reconcile(&pipeline).await {
            Ok(result) => {
                self.rejected = None;
                PassOutcome::Reconciled(result)
            }
            Err(Error::InvalidSpec(errors)) => {
                warn!(violations = errors.len(), "Waiting for the pipeline to change");
                self.rejected = Some(pipeline.spec);
                PassOutcome::Rejected
            }
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "Reconciliation error");
                PassOutcome::Failed(e)
            }
        }
    }

    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// Handle to stop a reconciliation loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::unreachable)]
mod tests {
    use super::*;
    use crate::reconciler::ReconcilerBuilder;
    use crate::store::{ClusterStore, InMemoryClusterStore};
    use logpipe_core::{OutputSpec, ParserSpec, SearchEngineSpec, WatchRule};

    fn pipeline() -> LogPipeline {
        LogPipeline::new(
            "main",
            LogPipelineSpec {
                namespace: "logging".into(),
                es_kib_version: "7.10.2".into(),
                parsers: vec![ParserSpec::new("json", "^(?<log>.*)$")],
                watch: vec![WatchRule {
                    namespace: "shop".into(),
                    parsers: vec!["json".into()],
                    outputs: vec![OutputSpec::stdout()],
                    ..WatchRule::default()
                }],
                elasticsearch: SearchEngineSpec::external("search.internal", 9200),
                ..LogPipelineSpec::default()
            },
        )
    }

    fn setup(pipeline: Option<LogPipeline>) -> (ReconciliationLoop, Arc<InMemoryPipelineSource>, Arc<InMemoryClusterStore>) {
        let store = Arc::new(InMemoryClusterStore::new());
        let reconciler = ReconcilerBuilder::new().with_store(store.clone()).build();
        let source = Arc::new(InMemoryPipelineSource::new(pipeline));
        let runner = ReconciliationLoop::new(
            Arc::new(reconciler.ok().unwrap_or_else(|| unreachable!("store provided"))),
            source.clone(),
            LoopConfig::default(),
        );
        (runner, source, store)
    }

    // ===== Behavior-Driven Tests =====

    /// Given no pipeline
    /// When the loop runs one iteration
    /// Then it waits a resync interval without touching the store
    #[tokio::test]
    async fn missing_pipeline_waits_for_resync() {
        let (mut runner, _, store) = setup(None);

        let outcome = runner.reconcile_once().await;

        assert!(matches!(outcome, PassOutcome::Missing));
        assert_eq!(outcome.requeue_after(&LoopConfig::default()), Duration::from_secs(30));
        assert!(store.is_empty().await);
    }

    /// Given a valid pipeline and an empty cluster
    /// When the loop iterates until convergence
    /// Then every pass before the last changed exactly one thing
    #[tokio::test]
    async fn iterations_converge_incrementally() {
        let (mut runner, _, store) = setup(Some(pipeline()));

        let mut passes = 0;
        while !runner.reconcile_once().await.is_converged() {
            passes += 1;
            assert!(passes < 50, "pipeline should converge");
        }

        assert_eq!(store.mutations().await.len(), passes);
        assert_eq!(store.len().await, passes);
    }

    /// Given a pipeline that fails validation
    /// When the loop runs twice without the pipeline changing
    /// Then the second iteration is skipped, and an edit clears the rejection
    #[tokio::test]
    async fn rejected_pipeline_is_skipped_until_changed() {
        let mut invalid = pipeline();
        invalid.spec.parsers.clear();
        let (mut runner, source, store) = setup(Some(invalid));

        assert!(matches!(runner.reconcile_once().await, PassOutcome::Rejected));
        assert!(matches!(runner.reconcile_once().await, PassOutcome::Skipped));
        assert!(store.is_empty().await);

        source
            .modify(|p| p.spec.parsers = vec![ParserSpec::new("json", "^(?<log>.*)$")])
            .await;
        assert!(matches!(runner.reconcile_once().await, PassOutcome::Reconciled(_)));
    }

    /// Given a store that fails the next create
    /// When the loop runs one iteration
    /// Then the outcome asks for the error requeue delay
    #[tokio::test]
    async fn store_failure_uses_error_requeue() {
        let (mut runner, _, store) = setup(Some(pipeline()));
        store
            .fail_next(
                crate::types::StoreOperation::Create,
                logpipe_resources::ResourceId::namespaced(
                    logpipe_resources::ResourceKind::ServiceAccount,
                    "fluent-bit",
                    "logging",
                ),
            )
            .await;

        let outcome = runner.reconcile_once().await;
        assert!(matches!(outcome, PassOutcome::Failed(Error::Store { .. })));
        assert_eq!(outcome.requeue_after(&LoopConfig::default()), Duration::from_secs(10));

        let retried = runner.reconcile_once().await;
        assert!(matches!(retried, PassOutcome::Reconciled(_)));
        assert!(store.get(&store.ids().await[0]).await.is_ok());
    }

    /// Given a loop that is running
    /// When stop() is called
    /// Then the loop should exit gracefully
    #[tokio::test]
    async fn stop_signal_terminates_loop() {
        let (mut runner, _, _) = setup(Some(pipeline()));
        let stopper = runner.stopper();

        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "Loop should stop within timeout");
        let inner = result.ok().and_then(|r| r.ok());
        assert!(matches!(inner, Some(Ok(()))));
    }
}
