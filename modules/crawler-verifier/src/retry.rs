//! Retry/backoff schedule for verification attempts, spec §4.D: up to
//! `MAX_RETRIES` retries after the initial attempt, each preceded by an
//! exponential backoff (1s/4s/16s) with ±25% jitter.

use std::time::Duration;

use rand::Rng;

/// Retries after the initial fetch attempt. Total fetches per candidate is
/// at most `MAX_RETRIES + 1`.
pub const MAX_RETRIES: u32 = 3;

/// Base backoff before jitter preceding a given (zero-indexed) retry number.
pub fn base_backoff(retry: u32) -> Duration {
    Duration::from_secs(4u64.pow(retry))
}

/// Apply ±25% jitter to a base backoff duration.
pub fn with_jitter(base: Duration) -> Duration {
    let factor = rand::rng().random_range(0.75..=1.25);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}
