//! Save/load/rename/delete orchestration with last-writer-wins freshness.
//!
//! Ordering contract for the save path: local write, then catalog update,
//! then remote upload attempt. This order is the crash-safety property and
//! must not be reordered. A remote failure never rolls back a completed
//! local step; the world is simply "locally saved, not yet synced", and the
//! only signal of sync lag is the timestamp gap found on next contact.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::{bounded, Receiver};
use tracing::{debug, info, warn};

use crate::catalog::WorldCatalog;
use crate::codec::{self, MapArtifact};
use crate::config::Limits;
use crate::core::{AnchorRecord, Timestamp, WorldName, WorldRecord};
use crate::paths;
use crate::store::{LocalMapStore, RemoteError, RemoteMapStore};

use super::worker::{self, RemoteOp, RemoteOutcome, WorkerHandle};
use super::SyncError;

/// How a save ended. `LocalOnly` is not an error: the local copy is durable
/// and the remote will catch up on a later save or explicit sync.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Local write, catalog update, and remote upload all succeeded.
    Synced,
    /// Local write and catalog update succeeded; the upload did not.
    LocalOnly(RemoteError),
}

impl SaveOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SaveOutcome::Synced)
    }
}

/// Per-name lock table: at most one save in flight per world name, while
/// saves for different names proceed in parallel.
#[derive(Default)]
struct NameLocks {
    inner: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    fn for_name(&self, name: &WorldName) -> Arc<Mutex<()>> {
        let mut table = lock(&self.inner);
        table
            .entry(name.as_str().to_string())
            .or_default()
            .clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drives reconciliation between the local store, the catalog, and the
/// remote store. Owns the remote worker thread; all dependencies are
/// injected so the application entry point controls the lifecycle.
pub struct SyncReconciler {
    local: LocalMapStore,
    remote: Arc<dyn RemoteMapStore>,
    catalog: Mutex<WorldCatalog>,
    save_locks: NameLocks,
    worker: WorkerHandle,
    limits: Limits,
}

impl SyncReconciler {
    pub fn new(
        local: LocalMapStore,
        remote: Arc<dyn RemoteMapStore>,
        catalog: WorldCatalog,
    ) -> Self {
        Self::with_limits(local, remote, catalog, Limits::default())
    }

    pub fn with_limits(
        local: LocalMapStore,
        remote: Arc<dyn RemoteMapStore>,
        catalog: WorldCatalog,
        limits: Limits,
    ) -> Self {
        let worker = worker::spawn(remote.clone());
        Self {
            local,
            remote,
            catalog: Mutex::new(catalog),
            save_locks: NameLocks::default(),
            worker,
            limits,
        }
    }

    /// Catalog record for a world, if known.
    pub fn world(&self, name: &WorldName) -> Option<WorldRecord> {
        lock(&self.catalog).find(name).cloned()
    }

    /// All known worlds, name-ordered.
    pub fn worlds(&self) -> Vec<WorldRecord> {
        lock(&self.catalog).all()
    }

    /// Outcomes of fire-and-forget remote operations (deletes).
    pub fn remote_outcomes(&self) -> &Receiver<RemoteOutcome> {
        self.worker.outcomes()
    }

    /// Persist an artifact under `name`. Local write precedes the catalog
    /// update, which precedes the upload attempt; a local i/o failure aborts
    /// the save, a remote failure degrades to `LocalOnly`.
    pub fn save(
        &self,
        name: &WorldName,
        artifact: &MapArtifact,
        timestamp: Timestamp,
    ) -> Result<SaveOutcome, SyncError> {
        let name_lock = self.save_locks.for_name(name);
        let _in_flight = lock(&name_lock);

        let bytes = codec::encode(artifact);
        if bytes.len() as u64 > self.limits.max_artifact_bytes {
            return Err(SyncError::ArtifactTooLarge {
                bytes: bytes.len(),
                max: self.limits.max_artifact_bytes,
            });
        }
        self.local.write_artifact(name, &bytes)?;
        if let Some(preview) = &artifact.preview {
            // Preview is decoration: losing it never fails the save.
            if let Err(err) = self.local.write_preview(name, preview) {
                warn!(world = %name, error = %err, "preview write failed");
            }
        }

        {
            let mut catalog = lock(&self.catalog);
            let previous = catalog.find(name).cloned();
            let record = WorldRecord {
                name: name.clone(),
                last_modified: timestamp,
                local_artifact: Some(paths::artifact_file(name)),
                remote_ref: previous.as_ref().and_then(|r| r.remote_ref),
                is_collaborative: previous.as_ref().is_some_and(|r| r.is_collaborative),
                pin: previous.and_then(|r| r.pin),
            };
            catalog.upsert(record)?;
        }

        let (respond, result_rx) = bounded(1);
        let send = self.worker.sender().send(RemoteOp::Upload {
            name: name.clone(),
            bytes,
            last_modified: timestamp,
            respond,
        });
        let upload = match send {
            Ok(()) => result_rx.recv().unwrap_or_else(|_| {
                Err(RemoteError::Unavailable {
                    reason: "remote worker stopped".to_string(),
                })
            }),
            Err(_) => Err(RemoteError::Unavailable {
                reason: "remote worker stopped".to_string(),
            }),
        };

        match upload {
            Ok(remote_ref) => {
                let mut catalog = lock(&self.catalog);
                if let Some(record) = catalog.find(name).cloned() {
                    if record.remote_ref != Some(remote_ref) {
                        let mut record = record;
                        record.remote_ref = Some(remote_ref);
                        catalog.upsert(record)?;
                    }
                }
                info!(world = %name, ts = timestamp.as_millis(), "world saved and synced");
                Ok(SaveOutcome::Synced)
            }
            Err(err) => {
                info!(world = %name, error = %err, "world saved locally, not yet synced");
                Ok(SaveOutcome::LocalOnly(err))
            }
        }
    }

    /// Open a world. Local artifact wins without a freshness check (loads
    /// stay fast and offline-capable); staleness is caught by
    /// `check_and_sync_if_newer`. A local artifact on disk is honored even
    /// when the catalog lagged behind a crash, and a corrupt local artifact
    /// falls back to the remote copy before surfacing `WorldNotFound`.
    pub fn resolve(&self, name: &WorldName) -> Result<MapArtifact, SyncError> {
        // Direct file probe first: catalog bookkeeping may lag local data.
        if self.local.artifact_exists(name) {
            match self
                .local
                .read_artifact(name)
                .map_err(SyncError::from)
                .and_then(|bytes| codec::decode(&bytes).map_err(SyncError::from))
            {
                Ok(artifact) => {
                    self.repair_catalog_entry(name)?;
                    return Ok(artifact);
                }
                Err(err) => {
                    warn!(world = %name, error = %err, "local artifact unusable, trying remote");
                }
            }
        }

        // Unknown world: pull remote metadata once and retry the lookup.
        if lock(&self.catalog).find(name).is_none() {
            if let Err(err) = self.refresh_catalog() {
                debug!(error = %err, "catalog refresh failed during resolve");
            }
        }

        let meta = match self.remote.fetch_metadata(name) {
            Ok(meta) => meta,
            Err(RemoteError::NotFound { .. }) => {
                return Err(SyncError::WorldNotFound {
                    name: name.as_str().to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        let bytes = self.remote.download(name)?;
        let artifact = codec::decode(&bytes)?;

        // Cache locally so the next resolve takes the fast path.
        self.local.write_artifact(name, &bytes)?;
        if let Some(preview) = &artifact.preview {
            if let Err(err) = self.local.write_preview(name, preview) {
                warn!(world = %name, error = %err, "preview write failed");
            }
        }
        let mut catalog = lock(&self.catalog);
        let previous = catalog.find(name).cloned();
        catalog.upsert(WorldRecord {
            name: name.clone(),
            last_modified: meta.last_modified,
            local_artifact: Some(paths::artifact_file(name)),
            remote_ref: Some(meta.remote_ref),
            is_collaborative: previous.as_ref().is_some_and(|r| r.is_collaborative),
            pin: previous.and_then(|r| r.pin),
        })?;

        Ok(artifact)
    }

    /// List a world's anchors without restoring AR state: the pose graph is
    /// skipped, not validated. Prefers the local copy, falls back to remote
    /// without caching.
    pub fn peek_anchors(&self, name: &WorldName) -> Result<Vec<AnchorRecord>, SyncError> {
        let bytes = match self.local.read_artifact(name) {
            Ok(bytes) => bytes,
            Err(_) => match self.remote.download(name) {
                Ok(bytes) => bytes,
                Err(RemoteError::NotFound { .. }) => {
                    return Err(SyncError::WorldNotFound {
                        name: name.as_str().to_string(),
                    })
                }
                Err(err) => return Err(err.into()),
            },
        };
        let (anchors, _preview) = codec::decode_anchors_only(&bytes)?;
        Ok(anchors)
    }

    /// Download and overwrite local state only when the remote copy is
    /// strictly newer. Local wins ties.
    pub fn check_and_sync_if_newer(&self, name: &WorldName) -> Result<bool, SyncError> {
        let local_ts = lock(&self.catalog)
            .find(name)
            .map(|r| r.last_modified)
            .ok_or_else(|| SyncError::WorldNotFound {
                name: name.as_str().to_string(),
            })?;

        let meta = match self.remote.fetch_metadata(name) {
            Ok(meta) => meta,
            Err(RemoteError::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if meta.last_modified <= local_ts {
            return Ok(false);
        }

        let bytes = self.remote.download(name)?;
        let artifact = codec::decode(&bytes)?;
        self.local.write_artifact(name, &bytes)?;
        if let Some(preview) = &artifact.preview {
            if let Err(err) = self.local.write_preview(name, preview) {
                warn!(world = %name, error = %err, "preview write failed");
            }
        }

        let mut catalog = lock(&self.catalog);
        let previous = catalog.find(name).cloned();
        catalog.upsert(WorldRecord {
            name: name.clone(),
            last_modified: meta.last_modified,
            local_artifact: Some(paths::artifact_file(name)),
            remote_ref: Some(meta.remote_ref),
            is_collaborative: previous.as_ref().is_some_and(|r| r.is_collaborative),
            pin: previous.and_then(|r| r.pin),
        })?;
        info!(world = %name, ts = meta.last_modified.as_millis(), "adopted newer remote copy");
        Ok(true)
    }

    /// Load under the old name, save under the new one, then delete the old
    /// name everywhere. The old remote record is removed synchronously, so a
    /// listing taken after rename returns cannot rediscover the old name.
    /// The preview follows the artifact; losing it is non-fatal. Renaming a
    /// world to its own name is a no-op.
    pub fn rename(&self, old: &WorldName, new: &WorldName) -> Result<(), SyncError> {
        if old == new {
            return Ok(());
        }

        let artifact = self.resolve(old)?;
        let previous = lock(&self.catalog).find(old).cloned();
        let standalone_preview = self.local.read_preview(old);

        self.save(new, &artifact, Timestamp::now())?;

        // Carry collaboration settings onto the new record.
        if let Some(previous) = previous {
            if previous.is_collaborative || previous.pin.is_some() {
                let mut catalog = lock(&self.catalog);
                if let Some(mut record) = catalog.find(new).cloned() {
                    record.is_collaborative = previous.is_collaborative;
                    record.pin = previous.pin;
                    catalog.upsert(record)?;
                }
            }
        }

        // The artifact may predate embedded previews; carry the standalone
        // file too.
        if artifact.preview.is_none() {
            if let Some(preview) = standalone_preview {
                if let Err(err) = self.local.write_preview(new, &preview) {
                    warn!(old = %old, new = %new, error = %err, "preview carry-over failed");
                }
            }
        }

        self.delete_local(old)?;
        // Synchronous: a background delete would leave a window where a
        // catalog refresh re-imports the old name.
        if let Err(err) = self.remote.delete(old) {
            warn!(world = %old, error = %err, "remote delete of old name failed, record left behind");
        }
        Ok(())
    }

    /// Remove a world. Local artifact and preview are best-effort, the
    /// catalog entry goes synchronously (the UI reflects deletion
    /// instantly), and the remote delete is issued in the background.
    pub fn delete(&self, name: &WorldName) -> Result<(), SyncError> {
        self.delete_local(name)?;
        let _ = self.worker.sender().send(RemoteOp::Delete { name: name.clone() });
        Ok(())
    }

    /// Merge metadata stubs for worlds that exist remotely but are unknown
    /// locally. Returns how many stubs were added. Run opportunistically at
    /// app start.
    pub fn refresh_catalog(&self) -> Result<usize, SyncError> {
        let listing = self.remote.list_all()?;
        let mut catalog = lock(&self.catalog);
        let stubs = listing.into_iter().map(|meta| WorldRecord {
            name: meta.name,
            last_modified: meta.last_modified,
            local_artifact: None,
            remote_ref: Some(meta.remote_ref),
            is_collaborative: false,
            pin: None,
        });
        let added = catalog.merge_stubs(stubs)?;
        if added > 0 {
            info!(added, "discovered remote worlds");
        }
        Ok(added)
    }

    /// Flag a world as collaborative once its remote record exists.
    pub fn mark_collaborative(&self, name: &WorldName) -> Result<(), SyncError> {
        let remote_ref = lock(&self.catalog)
            .find(name)
            .and_then(|r| r.remote_ref)
            .ok_or_else(|| SyncError::WorldNotFound {
                name: name.as_str().to_string(),
            })?;
        lock(&self.catalog).mark_collaborative(name, remote_ref)?;
        Ok(())
    }

    /// Stop the remote worker after draining queued operations.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }

    /// Local artifact and preview removal is best-effort; the catalog entry
    /// goes synchronously so the UI reflects deletion instantly.
    fn delete_local(&self, name: &WorldName) -> Result<(), SyncError> {
        if let Err(err) = self.local.delete_artifact(name) {
            warn!(world = %name, error = %err, "local artifact delete failed");
        }
        if let Err(err) = self.local.delete_preview(name) {
            warn!(world = %name, error = %err, "preview delete failed");
        }
        lock(&self.catalog).remove(name)?;
        Ok(())
    }

    /// Rebuild a missing catalog entry from the on-disk artifact, using the
    /// file mtime as the best available freshness estimate.
    fn repair_catalog_entry(&self, name: &WorldName) -> Result<(), SyncError> {
        let mut catalog = lock(&self.catalog);
        if catalog.find(name).is_some() {
            return Ok(());
        }
        let last_modified = self.local.artifact_mtime(name).unwrap_or_else(Timestamp::now);
        warn!(world = %name, "catalog lagged behind local artifact, rebuilding entry");
        catalog.upsert(WorldRecord {
            name: name.clone(),
            last_modified,
            local_artifact: Some(paths::artifact_file(name)),
            remote_ref: None,
            is_collaborative: false,
            pin: None,
        })?;
        Ok(())
    }
}
