//! World identity and catalog records.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::InvalidName;
use super::time::Timestamp;

/// Validated world name. Catalog key, and the stem of the on-disk artifact
/// file, so path separators and control characters are rejected.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldName(String);

impl WorldName {
    pub fn parse(raw: &str) -> Result<Self, InvalidName> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidName::World {
                raw: raw.to_string(),
                reason: "name is empty".to_string(),
            });
        }
        if trimmed.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
            return Err(InvalidName::World {
                raw: raw.to_string(),
                reason: "name contains path separators or control characters".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to the remote object backing a collaborative world.
/// Ordered so it can key anchor-feed maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRef(pub Uuid);

impl RemoteRef {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One catalog entry per named physical space.
///
/// Created when a scan is first saved or a remote world is discovered.
/// `last_modified` advances on every successful save; the record is removed
/// on explicit delete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldRecord {
    pub name: WorldName,
    pub last_modified: Timestamp,
    /// Relative artifact file name under the worlds directory, if a local
    /// copy exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ref: Option<RemoteRef>,
    #[serde(default)]
    pub is_collaborative: bool,
    /// Shared-secret gate for joining collaboration. Stored only; enforcement
    /// is a presentation-layer concern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

impl WorldRecord {
    /// Metadata-only stub for a world discovered remotely but never loaded.
    pub fn remote_stub(name: WorldName, last_modified: Timestamp) -> Self {
        Self {
            name,
            last_modified,
            local_artifact: None,
            remote_ref: None,
            is_collaborative: false,
            pin: None,
        }
    }
}
