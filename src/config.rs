//! Config loading and persistence.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Relocalization settle delay before a debounced transition is exposed.
pub const DEFAULT_SETTLE_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debounce window for relocalization state transitions.
    pub settle_ms: u64,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_SETTLE_MS,
            limits: Limits::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest encoded artifact the save path accepts.
    pub max_artifact_bytes: u64,
    /// Longest anchor label accepted at placement, in characters.
    pub max_anchor_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_artifact_bytes: 512 * 1024 * 1024,
            max_anchor_name_len: 256,
        }
    }
}

impl Config {
    /// Load config from a JSON file, falling back to defaults when the file
    /// is missing or malformed. A bad config file must not block startup.
    pub fn load_or_default(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "config malformed, using defaults");
                Self::default()
            }
        }
    }
}
