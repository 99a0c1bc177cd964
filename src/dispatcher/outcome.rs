// ABOUTME: Terminal outcomes of a dispatched call.
// ABOUTME: Exhaustion is a normal result, distinct from errors like Decode.

use crate::retry::AttemptFailure;

/// Why a call ended without a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhaustion {
    /// Attempts made, including rate-limited ones.
    pub attempts: u32,
    /// The failure of the final attempt.
    pub last_failure: AttemptFailure,
}

/// Result of a call that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// A 2xx response whose payload decoded as `T`.
    Success(T),
    /// Every attempt failed.
    Exhausted(Exhaustion),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Outcome::Exhausted(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Exhausted(_) => None,
        }
    }

    pub fn exhaustion(&self) -> Option<&Exhaustion> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Exhausted(exhaustion) => Some(exhaustion),
        }
    }

    /// The payload, or `None` if the call was exhausted.
    pub fn into_success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Exhausted(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Exhausted(exhaustion) => Outcome::Exhausted(exhaustion),
        }
    }
}
