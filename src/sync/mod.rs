//! Reconciliation between the local store and the remote object store.

pub mod reconciler;
pub mod worker;

use thiserror::Error;

use crate::codec::DecodeError;
use crate::core::CoreError;
use crate::error::Transience;
use crate::store::{RemoteError, StoreError};

pub use reconciler::{SaveOutcome, SyncReconciler};
pub use worker::{RemoteOp, RemoteOutcome, WorkerHandle};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The world is unknown locally and remotely.
    #[error("world `{name}` not found")]
    WorldNotFound { name: String },

    /// Encoded artifact exceeds the configured size limit; nothing was
    /// written.
    #[error("artifact is {bytes} bytes, over the {max} byte limit")]
    ArtifactTooLarge { bytes: usize, max: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SyncError {
    pub fn transience(&self) -> Transience {
        match self {
            SyncError::WorldNotFound { .. } | SyncError::ArtifactTooLarge { .. } => {
                Transience::Permanent
            }
            SyncError::Store(e) => e.transience(),
            SyncError::Remote(e) => e.transience(),
            SyncError::Decode(e) => e.transience(),
            SyncError::Core(e) => e.transience(),
        }
    }
}
