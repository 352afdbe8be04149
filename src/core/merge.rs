//! Anchor merge and uniqueness rules.
//!
//! Name equality is the sole identity key: two remote anchors with different
//! names at the same physical point are distinct, and no transform-based
//! deduplication is attempted.

use std::collections::BTreeSet;

use super::anchor::{split_trailing_emoji, AnchorRecord};

/// Select the subset of remotely added anchors that should enter the active
/// session: everything whose name is not already present and is not the
/// reserved guide anchor.
///
/// Imported records keep their names as-is; they are expected to be unique by
/// construction on the originating device, and exact duplicates are skipped
/// outright rather than renamed.
pub fn compute_new_anchors(
    remote: Vec<AnchorRecord>,
    session_names: &BTreeSet<String>,
) -> Vec<AnchorRecord> {
    remote
        .into_iter()
        .filter(|record| !record.is_guide() && !session_names.contains(&record.name))
        .collect()
}

/// Resolve a name collision for an interactively placed anchor.
///
/// If `base` is unused it is returned unchanged. Otherwise a single trailing
/// emoji is split off, an increasing integer is appended to the trimmed stem,
/// and the emoji is re-appended after the digits: `"keys 🔑"` collides into
/// `"keys1 🔑"`, then `"keys2 🔑"`, until no collision remains. Previously
/// assigned names are never reused or reshuffled.
pub fn unique_name(base: &str, existing: &BTreeSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }

    let (stem, emoji) = split_trailing_emoji(base);
    for n in 1u64.. {
        let candidate = match emoji {
            Some(emoji) => format!("{stem}{n} {emoji}"),
            None => format!("{stem}{n}"),
        };
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("u64 suffix space exhausted");
}
