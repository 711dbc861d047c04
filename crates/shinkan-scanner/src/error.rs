//! Pipeline error types.

use thiserror::Error;

/// Errors from the discovery/verification pipeline.
///
/// Most fetch failures are handled inside the pipeline (fallback chains,
/// circuit breaker) and never surface here; what does surface is treated
/// by the orchestrator as a per-series failure that must not abort the
/// batch.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Store operation failed; the affected entity is still in its prior
    /// state.
    #[error("database error: {0}")]
    Database(#[from] shinkan_db::DatabaseError),

    /// Fetch failure that escaped the pipeline's local handling.
    #[error("fetch error: {0}")]
    Fetch(#[from] shinkan_fetch::FetchError),

    /// Series definition problem.
    #[error("series error: {0}")]
    Series(#[from] shinkan_series::SeriesError),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ScanError>;
