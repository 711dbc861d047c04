//! Request pacing and retry backoff computation.
//!
//! Pure duration math, separated from the client so the schedules are
//! testable without sleeping.

use rand::Rng;
use shinkan_core::PacingConfig;
use std::time::Duration;

/// Maximum retry attempts per fetch (initial attempt excluded).
pub const MAX_RETRIES: u32 = 2;

/// Base backoff in seconds; doubles per attempt.
pub const BACKOFF_BASE_SECS: u64 = 10;

/// Backoff ceiling in seconds.
pub const BACKOFF_CAP_SECS: u64 = 60;

/// Upper bound of the random jitter added to each backoff, in seconds.
pub const BACKOFF_JITTER_SECS: u64 = 5;

/// The kind of request being paced. Search pages draw more scrutiny from
/// the source's rate limiter and get a longer pre-request delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Catalog search result page
    Search,
    /// Product detail page
    Detail,
    /// Anything else (warm-up, redirects)
    Other,
}

/// Randomized pre-request delay for a request kind.
#[must_use]
pub fn pre_request_delay(config: &PacingConfig, kind: RequestKind) -> Duration {
    let (min, max) = match kind {
        RequestKind::Search => config.search_delay_ms,
        RequestKind::Detail => config.detail_delay_ms,
        RequestKind::Other => config.other_delay_ms,
    };
    jittered_ms(min, max)
}

/// Backoff before retry `attempt` (1-based): exponential with jitter,
/// capped.
#[must_use]
pub fn retry_backoff(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_SECS.saturating_mul(1_u64 << attempt.min(6));
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_SECS * 1000);
    let total_ms = (base * 1000 + jitter).min(BACKOFF_CAP_SECS * 1000);
    Duration::from_millis(total_ms)
}

/// A randomized duration in `[min_ms, max_ms]`.
#[must_use]
pub fn jittered_ms(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms {
        (min_ms, max_ms)
    } else {
        (max_ms, min_ms)
    };
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}
