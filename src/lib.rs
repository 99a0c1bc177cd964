// ABOUTME: Root module for pacer - rate-limited, concurrency-bounded HTTP dispatch.
// ABOUTME: Re-exports all public types from submodules.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod prelude;
pub mod retry;
pub mod throttle;
pub mod transport;

pub use error::PacerError;
