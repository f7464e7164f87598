//! Tagged stage results: a value that is either genuine or a fallback.
//!
//! Several collaborators "fail soft": OCR failure reads as empty text, a
//! transcription failure as an empty transcript, and so on. Returning a bare
//! empty string would make "the frame has no text" indistinguishable from
//! "tesseract crashed". [`Outcome`] keeps the fallback value *and* the reason
//! it was used, so the orchestrator can log it and tests can assert on it.

use serde::{Deserialize, Serialize};

/// The result of a fail-soft operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The collaborator produced this value.
    Ok(T),
    /// The collaborator failed; `value` is the safe default used in its place.
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    /// Wrap a fallback value together with the reason it was needed.
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    /// The degradation reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Ok(v) | Outcome::Degraded { value: v, .. } => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Ok(v) | Outcome::Degraded { value: v, .. } => v,
        }
    }

    /// Turn a fallible value into an outcome, falling back to `fallback` on error.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>, fallback: T) -> Self {
        match result {
            Ok(v) => Outcome::Ok(v),
            Err(e) => Outcome::degraded(fallback, e.to_string()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Degrade to `T::default()`.
    pub fn empty(reason: impl Into<String>) -> Self {
        Outcome::degraded(T::default(), reason)
    }
}
