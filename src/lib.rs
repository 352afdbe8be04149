#![forbid(unsafe_code)]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
mod paths;
pub mod session;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use error::{Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::catalog::WorldCatalog;
pub use crate::codec::{DecodeError, MapArtifact};
pub use crate::core::{
    AnchorRecord, CoreError, RemoteRef, Timestamp, Transform, WorldName, WorldRecord,
    GUIDE_ANCHOR,
};
pub use crate::session::{
    AnchorImporter, ImportOutcome, RelocState, RelocalizationStateMachine, SessionError,
    TrackingSignal,
};
pub use crate::store::{LocalMapStore, MemoryRemote, RemoteError, RemoteMapStore, StoreError};
pub use crate::sync::{SaveOutcome, SyncError, SyncReconciler};
