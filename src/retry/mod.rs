// ABOUTME: Retry module - attempt accounting, backoff, and retry hints.
// ABOUTME: Decides whether a failed attempt is retried and after how long.

mod policy;
mod retry_after;

pub use policy::*;
pub use retry_after::*;
