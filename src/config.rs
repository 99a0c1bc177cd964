// ABOUTME: Construction-time configuration for the request dispatcher.
// ABOUTME: Loads from JSON, applies defaults, and validates every limit.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ConfigError;

/// Default number of requests allowed in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Default number of delivery attempts per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base for exponential backoff, in seconds.
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_base() -> f64 {
    DEFAULT_BACKOFF_BASE
}

/// Configuration for a [`Dispatcher`](crate::dispatcher::Dispatcher).
///
/// Deserializes from JSON such as:
///
/// ```json
/// {
///   "base_url": "https://api.example.com",
///   "max_requests_per_window": 5,
///   "window_secs": 10,
///   "concurrency_limit": 2
/// }
/// ```
///
/// Omitted fields fall back to the defaults (`concurrency_limit = 5`,
/// `max_attempts = 3`, `backoff_base = 2.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Prefix joined with every endpoint path.
    pub base_url: String,
    /// Requests admitted per rolling window.
    pub max_requests_per_window: usize,
    /// Length of the rolling window, in seconds.
    pub window_secs: f64,
    /// Requests allowed in the send phase at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Delivery attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base of the exponential backoff between failed attempts.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
}

impl DispatcherConfig {
    /// Create a configuration with default concurrency and retry settings.
    pub fn new(base_url: impl Into<String>, max_requests_per_window: usize, window: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            max_requests_per_window,
            window_secs: window.as_secs_f64(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Set the concurrency limit.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Set the maximum number of attempts per call.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the exponential backoff base.
    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// The rolling window as a `Duration`.
    ///
    /// Values that are not a valid duration map to zero, which
    /// [`validate`](Self::validate) rejects.
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_secs).unwrap_or(Duration::ZERO)
    }

    /// Reject non-positive limits, durations and malformed base URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests_per_window == 0 {
            return Err(ConfigError::Invalid(
                "max_requests_per_window must be positive".into(),
            ));
        }
        match Duration::try_from_secs_f64(self.window_secs) {
            Ok(window) if !window.is_zero() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "window_secs must be a positive number, got {}",
                    self.window_secs
                )));
            }
        }
        if self.concurrency_limit == 0 || self.concurrency_limit > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid(format!(
                "concurrency_limit must be between 1 and {}, got {}",
                Semaphore::MAX_PERMITS,
                self.concurrency_limit
            )));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be positive".into()));
        }
        if !self.backoff_base.is_finite() || self.backoff_base <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff_base must be a positive number, got {}",
                self.backoff_base
            )));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn valid() -> DispatcherConfig {
        DispatcherConfig::new("https://api.example.com", 5, Duration::from_secs(10))
    }

    #[test]
    fn test_new_applies_defaults() {
        let config = valid();
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_base, 2.0);
        assert_eq!(config.window(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = valid()
            .with_concurrency_limit(2)
            .with_max_attempts(7)
            .with_backoff_base(1.5);
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.backoff_base, 1.5);
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = valid();
        config.max_requests_per_window = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        assert!(valid().with_concurrency_limit(0).validate().is_err());
        assert!(valid().with_max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_window_and_backoff() {
        let mut config = valid();
        config.window_secs = 0.0;
        assert!(config.validate().is_err());
        config.window_secs = -1.0;
        assert!(config.validate().is_err());
        config.window_secs = f64::NAN;
        assert!(config.validate().is_err());

        assert!(valid().with_backoff_base(0.0).validate().is_err());
        assert!(valid().with_backoff_base(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = DispatcherConfig::new("not a url", 5, Duration::from_secs(1));
        match config.validate() {
            Err(ConfigError::BaseUrl { url, .. }) => assert_eq!(url, "not a url"),
            other => panic!("Expected BaseUrl error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_defaults() {
        let config = DispatcherConfig::from_json_str(
            r#"{"base_url": "http://localhost:8080", "max_requests_per_window": 3, "window_secs": 0.5}"#,
        )
        .unwrap();
        assert_eq!(config.max_requests_per_window, 3);
        assert_eq!(config.window(), Duration::from_millis(500));
        assert_eq!(config.concurrency_limit, DEFAULT_CONCURRENCY_LIMIT);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_from_json_validates() {
        let result = DispatcherConfig::from_json_str(
            r#"{"base_url": "http://localhost", "max_requests_per_window": 0, "window_secs": 1}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = DispatcherConfig::from_json_str("{");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"base_url": "https://api.example.com", "max_requests_per_window": 5, "window_secs": 10, "concurrency_limit": 2}}"#
        )
        .unwrap();

        let config = DispatcherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.concurrency_limit, 2);

        let missing = DispatcherConfig::from_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
