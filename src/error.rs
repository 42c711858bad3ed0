//! Typed error taxonomy for the graph data service.
//!
//! Every failure observable through the public API is one of these variants.
//! The taxonomy is part of the external contract: each variant carries a
//! stable kind string and a stable error code so callers can branch on
//! failures without parsing messages.
//!
//! Errors are `Clone` because a single-flight computation broadcasts one
//! failure to every caller waiting on the same cache key.

use crate::error_codes;

/// Errors surfaced by the graph data service.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GraphServiceError {
    /// Bad request shape or parameters. Never retried; the client must fix
    /// the request.
    #[error("invalid request: {0}")]
    Validation(String),

    /// An essential read-only collaborator (chunk store, snapshot source)
    /// is unreachable. Retryable by the caller.
    #[error("data source unavailable: {0}")]
    DataUnavailable(String),

    /// The projection computation exceeded its configured time ceiling.
    /// The caller may retry with a smaller `max_nodes`.
    #[error("projection exceeded time ceiling of {timeout_ms} ms")]
    ComputeTimeout { timeout_ms: u64 },

    /// The graph data feature flag is off. Not retryable until the flag
    /// changes.
    #[error("feature '{0}' is disabled")]
    FeatureDisabled(String),

    /// Unexpected failure. Logged with full context, surfaced generically.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphServiceError {
    /// Stable machine-readable kind for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphServiceError::Validation(_) => "validation",
            GraphServiceError::DataUnavailable(_) => "data_unavailable",
            GraphServiceError::ComputeTimeout { .. } => "compute_timeout",
            GraphServiceError::FeatureDisabled(_) => "feature_disabled",
            GraphServiceError::Internal(_) => "internal",
        }
    }

    /// Stable error code (see [`crate::error_codes`]).
    pub fn code(&self) -> &'static str {
        match self {
            GraphServiceError::Validation(_) => error_codes::CGR_VAL_001_BAD_REQUEST,
            GraphServiceError::DataUnavailable(_) => {
                error_codes::CGR_DATA_001_STORE_UNREACHABLE
            }
            GraphServiceError::ComputeTimeout { .. } => {
                error_codes::CGR_CMP_001_PROJECTION_TIMEOUT
            }
            GraphServiceError::FeatureDisabled(_) => {
                error_codes::CGR_FLAG_001_FEATURE_DISABLED
            }
            GraphServiceError::Internal(_) => error_codes::CGR_INT_001_UNEXPECTED,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GraphServiceError::DataUnavailable(_) | GraphServiceError::ComputeTimeout { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphServiceError>;
