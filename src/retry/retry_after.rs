// ABOUTME: Reads the server-provided Retry-After hint from a 429 response.
// ABOUTME: Only delay-seconds are honored, capped at the backoff ceiling.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use super::policy::MAX_BACKOFF;

/// Wait used when a rate-limited response carries no usable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Parse the `Retry-After` header as whole seconds.
///
/// Absent, negative, fractional, non-ASCII and HTTP-date values all yield
/// [`DEFAULT_RETRY_AFTER`]. Hints longer than [`MAX_BACKOFF`] are clamped.
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
