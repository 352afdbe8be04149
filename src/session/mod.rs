//! Active AR session coordination: relocalization gating and collaborative
//! anchor import.

pub mod import;
pub mod reloc;

use thiserror::Error;

use crate::core::InvalidName;
use crate::error::Transience;

pub use import::{place_anchor, AnchorImporter, ImportOutcome};
pub use reloc::{RelocState, RelocalizationStateMachine, TrackingSignal};

#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum SessionError {
    /// Relocalization has not settled into `Tracking`; anchor-dependent
    /// writes are refused until it does.
    #[error("relocalization incomplete: anchor operations are not safe yet")]
    NotTracking,

    #[error(transparent)]
    InvalidName(#[from] InvalidName),
}

impl SessionError {
    pub fn transience(&self) -> Transience {
        match self {
            // Tracking may settle at any moment.
            SessionError::NotTracking => Transience::Retryable,
            SessionError::InvalidName(_) => Transience::Permanent,
        }
    }
}
