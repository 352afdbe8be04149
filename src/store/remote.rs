//! Remote object store boundary.
//!
//! The real backend is an opaque key-object service owned by the platform;
//! this module fixes the contract the reconciler programs against and ships
//! an in-process implementation for tests and local development.
//!
//! Upsert is by world name, not by record id: only one remote artifact per
//! name is supported, so the same name from two uncoordinated devices will
//! overwrite each other's map on next upload. Preserved as-is; see DESIGN.md.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::{AnchorRecord, RemoteRef, Timestamp, WorldName};
use crate::error::Transience;

#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum RemoteError {
    /// Network or service outage; retry may help.
    #[error("remote store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("no remote record for world `{name}`")]
    NotFound { name: String },

    /// Auth and quota failures, collapsed to one kind.
    #[error("remote store rejected request: {reason}")]
    Rejected { reason: String },
}

impl RemoteError {
    pub fn transience(&self) -> Transience {
        match self {
            RemoteError::Unavailable { .. } => Transience::Retryable,
            RemoteError::NotFound { .. } | RemoteError::Rejected { .. } => Transience::Permanent,
        }
    }
}

/// Remote-side metadata for one world record.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteMeta {
    pub name: WorldName,
    pub last_modified: Timestamp,
    pub remote_ref: RemoteRef,
}

/// Monotonic position in a world's collaborative anchor feed. Opaque to the
/// core; only the remote store assigns values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnchorCursor(pub u64);

/// Contract over the remote key-object store.
///
/// Calls are blocking from the caller's perspective; asynchrony is provided
/// by the sync worker thread, never inside implementations. No operation
/// retries automatically - retry policy lives in the reconciler.
pub trait RemoteMapStore: Send + Sync {
    /// Create or overwrite the remote record for `name` (upsert by name).
    /// Returns the stable reference for the record.
    fn upload(
        &self,
        name: &WorldName,
        bytes: &[u8],
        last_modified: Timestamp,
    ) -> Result<RemoteRef, RemoteError>;

    fn fetch_metadata(&self, name: &WorldName) -> Result<RemoteMeta, RemoteError>;

    fn download(&self, name: &WorldName) -> Result<Vec<u8>, RemoteError>;

    /// Idempotent: deleting an absent record succeeds.
    fn delete(&self, name: &WorldName) -> Result<(), RemoteError>;

    fn list_all(&self) -> Result<Vec<RemoteMeta>, RemoteError>;

    /// Anchor records added to the world after `since`, oldest first, plus
    /// the cursor to resume from next time.
    fn fetch_incremental_anchors(
        &self,
        world: RemoteRef,
        since: AnchorCursor,
    ) -> Result<(Vec<AnchorRecord>, AnchorCursor), RemoteError>;
}

#[derive(Debug)]
struct RemoteObject {
    remote_ref: RemoteRef,
    bytes: Vec<u8>,
    last_modified: Timestamp,
}

#[derive(Debug, Default)]
struct MemoryInner {
    objects: BTreeMap<String, RemoteObject>,
    anchors: BTreeMap<RemoteRef, Vec<(u64, AnchorRecord)>>,
    next_seq: u64,
    offline: bool,
    fail_next_upload: bool,
}

/// In-process remote store with fault injection, for tests and the demo
/// entry point.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<MemoryInner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a total outage: every call fails until restored.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Fail only the next upload, then recover.
    pub fn fail_next_upload(&self) {
        self.lock().fail_next_upload = true;
    }

    /// Append a collaboratively added anchor to a world's feed.
    pub fn push_anchor(&self, world: RemoteRef, record: AnchorRecord) {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.anchors.entry(world).or_default().push((seq, record));
    }

    pub fn record_count(&self) -> usize {
        self.lock().objects.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(inner: &MemoryInner) -> Result<(), RemoteError> {
        if inner.offline {
            return Err(RemoteError::Unavailable {
                reason: "remote offline".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteMapStore for MemoryRemote {
    fn upload(
        &self,
        name: &WorldName,
        bytes: &[u8],
        last_modified: Timestamp,
    ) -> Result<RemoteRef, RemoteError> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        if inner.fail_next_upload {
            inner.fail_next_upload = false;
            return Err(RemoteError::Unavailable {
                reason: "injected upload failure".to_string(),
            });
        }
        let object = inner
            .objects
            .entry(name.as_str().to_string())
            .or_insert_with(|| RemoteObject {
                remote_ref: RemoteRef::generate(),
                bytes: Vec::new(),
                last_modified: Timestamp(0),
            });
        object.bytes = bytes.to_vec();
        object.last_modified = last_modified;
        Ok(object.remote_ref)
    }

    fn fetch_metadata(&self, name: &WorldName) -> Result<RemoteMeta, RemoteError> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        let object = inner
            .objects
            .get(name.as_str())
            .ok_or_else(|| RemoteError::NotFound {
                name: name.as_str().to_string(),
            })?;
        Ok(RemoteMeta {
            name: name.clone(),
            last_modified: object.last_modified,
            remote_ref: object.remote_ref,
        })
    }

    fn download(&self, name: &WorldName) -> Result<Vec<u8>, RemoteError> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        inner
            .objects
            .get(name.as_str())
            .map(|object| object.bytes.clone())
            .ok_or_else(|| RemoteError::NotFound {
                name: name.as_str().to_string(),
            })
    }

    fn delete(&self, name: &WorldName) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        if let Some(object) = inner.objects.remove(name.as_str()) {
            inner.anchors.remove(&object.remote_ref);
        }
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<RemoteMeta>, RemoteError> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        Ok(inner
            .objects
            .iter()
            .map(|(name, object)| RemoteMeta {
                name: WorldName::parse(name).expect("stored names are valid"),
                last_modified: object.last_modified,
                remote_ref: object.remote_ref,
            })
            .collect())
    }

    fn fetch_incremental_anchors(
        &self,
        world: RemoteRef,
        since: AnchorCursor,
    ) -> Result<(Vec<AnchorRecord>, AnchorCursor), RemoteError> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        let mut cursor = since;
        let mut records = Vec::new();
        if let Some(feed) = inner.anchors.get(&world) {
            for (seq, record) in feed {
                if *seq >= since.0 {
                    records.push(record.clone());
                    cursor = AnchorCursor(seq + 1);
                }
            }
        }
        Ok((records, cursor))
    }
}
