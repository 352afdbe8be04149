//! Directory layout helpers for world artifacts and the catalog snapshot.
//!
//! Default base is `WM_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/waymark`
//! or `~/.local/share/waymark`. Stores accept an explicit root, so these
//! defaults only matter for the application entry point.

use std::path::PathBuf;

use crate::core::WorldName;

/// Base directory for persistent data.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WM_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("waymark")
}

/// Root directory for world artifacts.
pub fn worlds_dir(base: &std::path::Path) -> PathBuf {
    base.join("worlds")
}

/// Catalog snapshot path (catalog.json).
pub fn catalog_path(base: &std::path::Path) -> PathBuf {
    base.join("catalog.json")
}

/// Artifact file name for a world.
pub fn artifact_file(name: &WorldName) -> String {
    format!("{}.wmap", name.as_str())
}

/// Preview image file name for a world.
pub fn preview_file(name: &WorldName) -> String {
    format!("{}.png", name.as_str())
}
