//! Error types for the reconciler crate.

use logpipe_core::ValidationErrors;
use logpipe_resources::ResourceId;
use thiserror::Error;

use crate::types::StoreOperation;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The specification is inconsistent; retrying cannot help until it changes.
    #[error("invalid specification:\n{0}")]
    InvalidSpec(ValidationErrors),

    #[error("{operation} {resource} failed: {reason}")]
    Store {
        operation: StoreOperation,
        resource: ResourceId,
        reason: String,
    },

    #[error("search engine endpoint unavailable: {reason}")]
    EndpointUnavailable { reason: String },

    #[error("pipeline could not be fetched: {reason}")]
    PipelineUnavailable { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    pub fn store(operation: StoreOperation, resource: ResourceId, reason: impl Into<String>) -> Self {
        Self::Store {
            operation,
            resource,
            reason: reason.into(),
        }
    }

    pub fn endpoint_unavailable(reason: impl Into<String>) -> Self {
        Self::EndpointUnavailable {
            reason: reason.into(),
        }
    }

    pub fn pipeline_unavailable(reason: impl Into<String>) -> Self {
        Self::PipelineUnavailable {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the next pass can succeed without a specification change.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidSpec(_) | Self::InvalidConfig { .. })
    }
}
