// ABOUTME: Defines the Transport trait - one HTTP exchange per call.
// ABOUTME: The dispatcher never touches the network except through this.

use async_trait::async_trait;

use super::{ExchangeRequest, ExchangeResponse};
use crate::error::TransportError;

/// Trait for transport implementations.
///
/// Implementations must be safe to call from many concurrent tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.
    ///
    /// Any response the server sends, including 4xx and 5xx, is returned as
    /// `Ok`. `Err` is reserved for exchanges that produced no response.
    async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, TransportError>;

    /// Release the transport's resources.
    async fn shutdown(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
