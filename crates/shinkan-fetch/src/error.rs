//! Fetch error taxonomy.
//!
//! The distinctions matter to the pipeline: transient failures are retried
//! here and reported only on exhaustion; not-found is permanent and needs
//! no fallback; challenge pages are not a transport error at all and feed
//! the caller's cache-fallback chain and circuit breaker.

use thiserror::Error;

/// Errors from fetching catalog pages.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connection, TLS, timeout) after all
    /// retries were exhausted.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        /// URL that failed
        url: String,
        /// Underlying client error
        source: reqwest::Error,
    },

    /// The source rate-limited us (HTTP 503) through every retry.
    #[error("rate limited fetching {url}")]
    RateLimited {
        /// URL that failed
        url: String,
    },

    /// The item does not exist (HTTP 404). Permanent; never retried.
    #[error("not found: {url}")]
    NotFound {
        /// URL that was requested
        url: String,
    },

    /// A 200 response whose body is an anti-bot challenge or otherwise
    /// too short to be a real page, through every retry.
    #[error("invalid page at {url}: {reason}")]
    InvalidPage {
        /// URL that was requested
        url: String,
        /// What made the body invalid
        reason: String,
    },

    /// An unexpected HTTP status through every retry.
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// URL that failed
        url: String,
        /// Status code received
        status: u16,
    },
}

impl FetchError {
    /// Whether this failure is permanent (retrying can never help).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
