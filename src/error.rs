// ABOUTME: Defines all error types for the pacer library using thiserror.
// ABOUTME: Each concern has its own error enum, unified under PacerError.

/// Top-level error type for the pacer library.
#[derive(Debug, thiserror::Error)]
pub enum PacerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Invalid construction-time configuration. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a single exchange with the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("transport is closed")]
    Closed,
}

/// Errors surfaced to callers of `Dispatcher::send`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("client closed")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("malformed response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Returned by `Throttle::acquire_with_cancel` when the wait is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;
