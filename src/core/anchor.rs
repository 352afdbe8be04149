//! Anchor records and display-name helpers.
//!
//! An anchor is a named rigid transform inside a world's coordinate frame.
//! The name is the sole identity key: merge and uniqueness logic compare
//! names exactly and never inspect transforms.

use minicbor::{Decode, Encode};
use serde::{Deserialize, Serialize};
use unicode_properties::UnicodeEmoji;
use unicode_segmentation::UnicodeSegmentation;

use super::error::InvalidName;

/// Reserved name for the system-placed mesh-coverage anchor.
///
/// Guide anchors are never user-visible and never participate in user-anchor
/// merge or uniqueness logic.
pub const GUIDE_ANCHOR: &str = "guide";

/// Row-major 4x4 rigid transform (position + orientation).
///
/// Opaque to this core: it is carried between the pose provider and the
/// remote store without interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f32; 16]);

impl Transform {
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// On the wire a transform is a 64-byte string: 16 little-endian f32,
// row-major. This matches the flat record layout of the remote store.
impl<C> minicbor::Encode<C> for Transform {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let mut buf = [0u8; 64];
        for (chunk, value) in buf.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        e.bytes(&buf)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Transform {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let raw = d.bytes()?;
        if raw.len() != 64 {
            return Err(minicbor::decode::Error::message(
                "transform must be 64 bytes (16 f32)",
            ));
        }
        let mut floats = [0.0f32; 16];
        for (value, chunk) in floats.iter_mut().zip(raw.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Transform(floats))
    }
}

/// One named marker inside a world.
///
/// `origin_world` is denormalized for the remote store, which is a flat
/// record space rather than nested under world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct AnchorRecord {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub transform: Transform,
    #[n(2)]
    pub origin_world: String,
}

impl AnchorRecord {
    pub fn new(name: impl Into<String>, transform: Transform, origin_world: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform,
            origin_world: origin_world.into(),
        }
    }

    pub fn is_guide(&self) -> bool {
        self.name == GUIDE_ANCHOR
    }
}

/// Validate a user-entered anchor label before placement. The reserved guide
/// name, control characters anywhere in the raw input, and labels longer
/// than `max_len` characters are refused.
pub fn validate_anchor_name(raw: &str, max_len: usize) -> Result<(), InvalidName> {
    if raw.chars().any(char::is_control) {
        return Err(InvalidName::Anchor {
            raw: raw.to_string(),
            reason: "name contains control characters".to_string(),
        });
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidName::Anchor {
            raw: raw.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if trimmed == GUIDE_ANCHOR {
        return Err(InvalidName::Anchor {
            raw: raw.to_string(),
            reason: "name is reserved".to_string(),
        });
    }
    if trimmed.chars().count() > max_len {
        return Err(InvalidName::Anchor {
            raw: raw.to_string(),
            reason: format!("name exceeds {max_len} characters"),
        });
    }
    Ok(())
}

/// Split a single trailing emoji grapheme off a display label.
///
/// Returns the label with the emoji and surrounding whitespace removed, plus
/// the emoji cluster if one was found. Only the last grapheme is inspected;
/// labels with multiple embedded emoji keep all but the trailing one in the
/// base. Classification uses the scalar emoji-presentation property, so some
/// multi-codepoint sequences (flags) may not be recognized.
pub fn split_trailing_emoji(name: &str) -> (&str, Option<&str>) {
    let Some((idx, last)) = name.grapheme_indices(true).next_back() else {
        return (name, None);
    };
    if is_emoji_grapheme(last) {
        (name[..idx].trim_end(), Some(last))
    } else {
        (name, None)
    }
}

fn is_emoji_grapheme(grapheme: &str) -> bool {
    let Some(first) = grapheme.chars().next() else {
        return false;
    };
    // ASCII digits, '#' and '*' carry the Emoji property as keycap
    // components; they are not emoji on their own.
    first.is_emoji_char() && !first.is_ascii()
}
