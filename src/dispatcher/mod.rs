// ABOUTME: Dispatcher module - bounded, throttled, retrying request delivery.
// ABOUTME: Combines the slot pool, the throttle, and the retry policy.

mod dispatcher;
mod outcome;

pub use dispatcher::{Call, Dispatcher};
pub use outcome::{Exhaustion, Outcome};
