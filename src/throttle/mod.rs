// ABOUTME: Throttle module - sliding-window admission control.
// ABOUTME: Bounds how many requests start within any rolling window.

mod throttle;

pub use throttle::Throttle;
