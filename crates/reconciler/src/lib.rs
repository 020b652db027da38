//! K8s-style reconciliation engine for log pipelines.
//!
//! - **Desired State**: built from the validated `LogPipeline` and the
//!   resolved search endpoint
//! - **Actual State**: read back from the cluster store, one resource at a time
//! - **Diff**: per-resource [`ensure`] over `ManagedResource` variants
//! - **Actions**: at most one create/update/delete per pass
//!
//! # Example
//!
//! ```ignore
//! use logpipe_reconciler::{
//!     InMemoryClusterStore, InMemoryPipelineSource, LoopConfig, ReconcilerBuilder,
//!     ReconciliationLoop,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryClusterStore::new());
//!     let reconciler = Arc::new(ReconcilerBuilder::new().with_store(store).build()?);
//!     let source = Arc::new(InMemoryPipelineSource::new(Some(pipeline)));
//!
//!     let mut loop_runner = ReconciliationLoop::new(reconciler, source, LoopConfig::default());
//!     loop_runner.run().await?;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod r#loop;
pub mod reconciler;
pub mod store;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use r#loop::{
    InMemoryPipelineSource, LoopConfig, LoopStopper, PassOutcome, PipelineSource,
    ReconciliationLoop,
};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig, ensure};
pub use store::{ClusterStore, InMemoryClusterStore, Mutation, TracingClusterStore};
pub use types::{ReconcileAction, ReconcileResult, ResourcePhase, StoreOperation};
