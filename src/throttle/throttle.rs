// ABOUTME: Sliding-window throttle for outbound request admission.
// ABOUTME: Admits at most N requests in any rolling window of duration T.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{Cancelled, ConfigError};

/// Upper bound on the timestamp buffer reserved up front.
const INITIAL_CAPACITY_LIMIT: usize = 1024;

/// Sliding-window throttle.
///
/// Keeps the timestamps of recently admitted requests, oldest first. A new
/// request is admitted only while fewer than `max_requests` timestamps fall
/// inside the trailing window; otherwise the caller is suspended until the
/// oldest one ages out.
///
/// The prune-check-append sequence runs under a single mutex, so concurrent
/// callers can never both observe a free slot and overrun the limit. The
/// mutex is not held while a caller sleeps.
///
/// Timestamps come from `tokio::time::Instant`, so tests can drive the
/// throttle with a paused clock.
pub struct Throttle {
    admitted: Mutex<VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl Throttle {
    /// Create a throttle admitting `max_requests` per rolling `window`.
    ///
    /// Returns `Err(ConfigError::Invalid)` if either limit is zero; a throttle
    /// with no capacity would suspend callers forever.
    pub fn new(max_requests: usize, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::Invalid(
                "throttle max_requests must be positive".into(),
            ));
        }
        if window.is_zero() {
            return Err(ConfigError::Invalid(
                "throttle window must be positive".into(),
            ));
        }

        Ok(Self {
            admitted: Mutex::new(VecDeque::with_capacity(
                max_requests.min(INITIAL_CAPACITY_LIMIT),
            )),
            max_requests,
            window,
        })
    }

    /// Maximum admissions per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until one more request fits in the window, then record it.
    pub async fn acquire(&self) {
        while let Some(wait_time) = self.try_admit().await {
            self.log_wait(wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Wait for admission, giving up if `cancel` completes first.
    ///
    /// Returns `Ok(())` once the admission has been recorded.
    /// Returns `Err(Cancelled)` if the cancel future completes while waiting;
    /// nothing is recorded in that case.
    pub async fn acquire_with_cancel<F>(&self, cancel: F) -> Result<(), Cancelled>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(cancel);

        while let Some(wait_time) = self.try_admit().await {
            self.log_wait(wait_time);

            tokio::select! {
                biased;
                () = &mut cancel => {
                    return Err(Cancelled);
                }
                () = tokio::time::sleep(wait_time) => {}
            }
        }
        Ok(())
    }

    fn log_wait(&self, wait_time: Duration) {
        tracing::debug!(
            wait_ms = wait_time.as_millis() as u64,
            max_requests = self.max_requests,
            "Throttle window full, waiting for admission"
        );
    }

    /// Attempt to admit one request without waiting.
    ///
    /// Returns `None` if admitted, otherwise how long until the oldest
    /// recorded admission leaves the window.
    async fn try_admit(&self) -> Option<Duration> {
        let mut admitted = self.admitted.lock().await;
        let now = Instant::now();

        while let Some(&oldest) = admitted.front() {
            if now.duration_since(oldest) < self.window {
                break;
            }
            admitted.pop_front();
        }

        if admitted.len() < self.max_requests {
            admitted.push_back(now);
            return None;
        }

        let oldest = admitted.front().copied().unwrap_or(now);
        Some(self.window.saturating_sub(now.duration_since(oldest)))
    }

    /// Number of admissions still inside the current window.
    pub async fn recent(&self) -> usize {
        let admitted = self.admitted.lock().await;
        let now = Instant::now();
        admitted
            .iter()
            .filter(|&&at| now.duration_since(at) < self.window)
            .count()
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish()
    }
}
