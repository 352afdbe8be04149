//! Filesystem persistence for artifacts, previews, and the catalog snapshot.
//!
//! All writes are atomic: temp file in the destination directory, fsync,
//! then rename. A crash mid-write never leaves a half-written file visible
//! under the final name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{WorldName, WorldRecord};
use crate::error::Transience;
use crate::paths;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no local artifact for world `{name}`")]
    NotFound { name: String },
}

impl StoreError {
    pub fn transience(&self) -> Transience {
        match self {
            StoreError::Io { .. } => Transience::Unknown,
            StoreError::NotFound { .. } => Transience::Permanent,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// Stateless filesystem service keyed by world name.
///
/// The catalog is the single writer of the snapshot file; artifact files are
/// only written through the reconciler's save path.
#[derive(Debug, Clone)]
pub struct LocalMapStore {
    worlds_dir: PathBuf,
    catalog_path: PathBuf,
}

impl LocalMapStore {
    /// Open a store rooted at `base`, creating directories as needed.
    pub fn open(base: &Path) -> Result<Self, StoreError> {
        let worlds_dir = paths::worlds_dir(base);
        fs::create_dir_all(&worlds_dir).map_err(|e| StoreError::io(&worlds_dir, e))?;
        Ok(Self {
            worlds_dir,
            catalog_path: paths::catalog_path(base),
        })
    }

    pub fn artifact_path(&self, name: &WorldName) -> PathBuf {
        self.worlds_dir.join(paths::artifact_file(name))
    }

    pub fn preview_path(&self, name: &WorldName) -> PathBuf {
        self.worlds_dir.join(paths::preview_file(name))
    }

    pub fn write_artifact(&self, name: &WorldName, bytes: &[u8]) -> Result<(), StoreError> {
        self.write_atomic(&self.artifact_path(name), bytes)
    }

    pub fn read_artifact(&self, name: &WorldName) -> Result<Vec<u8>, StoreError> {
        let path = self.artifact_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.as_str().to_string(),
            }),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    pub fn artifact_exists(&self, name: &WorldName) -> bool {
        self.artifact_path(name).is_file()
    }

    /// Idempotent: deleting a non-existent artifact is not an error.
    pub fn delete_artifact(&self, name: &WorldName) -> Result<(), StoreError> {
        Self::remove_if_present(&self.artifact_path(name))
    }

    /// File modification time, used to rebuild a catalog entry when the
    /// snapshot lagged behind a crash.
    pub fn artifact_mtime(&self, name: &WorldName) -> Option<crate::core::Timestamp> {
        let meta = fs::metadata(self.artifact_path(name)).ok()?;
        let mtime = meta.modified().ok()?;
        let ms = mtime
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_millis() as u64;
        Some(crate::core::Timestamp(ms))
    }

    pub fn write_preview(&self, name: &WorldName, bytes: &[u8]) -> Result<(), StoreError> {
        self.write_atomic(&self.preview_path(name), bytes)
    }

    pub fn read_preview(&self, name: &WorldName) -> Option<Vec<u8>> {
        fs::read(self.preview_path(name)).ok()
    }

    pub fn delete_preview(&self, name: &WorldName) -> Result<(), StoreError> {
        Self::remove_if_present(&self.preview_path(name))
    }

    /// Whole-file rewrite of the catalog snapshot (append-replace, not a log).
    pub fn write_catalog_snapshot(&self, records: &[WorldRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::io(&self.catalog_path, e.into()))?;
        self.write_atomic(&self.catalog_path, &json)
    }

    /// Missing or corrupt snapshot degrades to an empty list. Callers treat
    /// "no catalog" identically to "empty catalog".
    pub fn read_catalog_snapshot(&self) -> Vec<WorldRecord> {
        let raw = match fs::read(&self.catalog_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.catalog_path.display(), error = %e, "catalog unreadable, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.catalog_path.display(), error = %e, "catalog snapshot malformed, starting empty");
                Vec::new()
            }
        }
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or(&self.worlds_dir);
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(bytes).map_err(|e| StoreError::io(path, e))?;
        tmp.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
        tmp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }

    fn remove_if_present(path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}
