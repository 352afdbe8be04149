//! Core capability errors (validation, naming invariants).
//!
//! These are bounded and stable: core errors represent domain/refusal states,
//! not library implementation details.

use thiserror::Error;

use crate::error::Transience;

/// Invalid world or anchor name.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidName {
    #[error("world name `{raw}` is invalid: {reason}")]
    World { raw: String, reason: String },
    #[error("anchor name `{raw}` is invalid: {reason}")]
    Anchor { raw: String, reason: String },
}

/// Canonical error enum for the core capability.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        // Core errors are pure domain/input failures.
        Transience::Permanent
    }
}
