// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use pacer::prelude::*;` to get started quickly.

pub use crate::config::DispatcherConfig;
pub use crate::dispatcher::{Call, Dispatcher, Exhaustion, Outcome};
pub use crate::error::{Cancelled, ConfigError, DispatchError, PacerError, TransportError};
pub use crate::retry::{AttemptFailure, RetryDecision, RetryPolicy};
pub use crate::throttle::Throttle;
pub use crate::transport::{
    ExchangeRequest, ExchangeResponse, HttpTransport, Method, RequestOptions, StatusCode,
    Transport,
};
