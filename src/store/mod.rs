//! Persistence services: local filesystem store and remote object store.

pub mod local;
pub mod remote;

pub use local::{LocalMapStore, StoreError};
pub use remote::{AnchorCursor, MemoryRemote, RemoteError, RemoteMapStore, RemoteMeta};
