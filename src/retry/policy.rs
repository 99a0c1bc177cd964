// ABOUTME: Retry policy - the per-call attempt state machine.
// ABOUTME: Maps a failed attempt to "retry after d" or "give up".

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{ConfigError, TransportError};

/// Longest backoff the policy will ever ask for.
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Why a single delivery attempt did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// The server answered 429 Too Many Requests.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The server answered with another non-success status.
    #[error("HTTP {0}")]
    Status(StatusCode),

    /// The exchange itself failed (connect, timeout, ...).
    #[error("{0}")]
    Transport(TransportError),
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Suspend for `after`, then make the next attempt.
    Retry { after: Duration },
    /// The attempt budget is spent.
    GiveUp,
}

/// Attempt budget plus exponential backoff.
///
/// Attempts are 0-indexed. A failure on attempt `k` is retried after
/// `backoff_base^k` seconds, or after the server's hint for 429 responses,
/// as long as `k + 1 < max_attempts`. Rate-limited attempts consume the
/// budget like any other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: f64,
}

impl RetryPolicy {
    /// Create a retry policy.
    ///
    /// Returns `Err(ConfigError::Invalid)` for a zero attempt budget or a
    /// backoff base that is not a positive finite number.
    pub fn new(max_attempts: u32, backoff_base: f64) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be positive".into()));
        }
        if !backoff_base.is_finite() || backoff_base <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff_base must be a positive number, got {}",
                backoff_base
            )));
        }
        Ok(Self {
            max_attempts,
            backoff_base,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_base(&self) -> f64 {
        self.backoff_base
    }

    /// Backoff after a transport or status failure on `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.backoff_base.powf(f64::from(attempt));
        Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// Decide what follows a failure on `attempt`.
    pub fn next(&self, attempt: u32, failure: &AttemptFailure) -> RetryDecision {
        if attempt.saturating_add(1) >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let after = match failure {
            AttemptFailure::RateLimited { retry_after } => (*retry_after).min(MAX_BACKOFF),
            AttemptFailure::Status(_) | AttemptFailure::Transport(_) => self.backoff(attempt),
        };
        RetryDecision::Retry { after }
    }
}
