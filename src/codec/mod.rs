//! Spatial map artifact framing (magic + length + crc32c per section).
//!
//! One artifact bundles three logical sections in fixed order:
//! pose-graph blob, minicbor anchor list, optional preview PNG. The pose
//! graph is owned by the external tracking provider's format and is never
//! inspected here. Pure transform: no disk or network I/O.

use bytes::Bytes;
use crc32c::crc32c;
use thiserror::Error;

use crate::core::AnchorRecord;
use crate::error::Transience;

const MAGIC: [u8; 4] = *b"WMK1";
const VERSION: u8 = 1;
const FLAG_PREVIEW: u8 = 0b0000_0001;
const HEADER_LEN: usize = 6; // magic + version + flags
const SECTION_HEADER_LEN: usize = 8; // length + crc32c

/// Guard against corrupt section lengths before allocating.
const MAX_SECTION_BYTES: usize = 256 * 1024 * 1024;

/// The opaque serialized bundle for one world.
///
/// Immutable once written under a given `(name, last_modified)` key; any
/// edit produces a new artifact with a new timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct MapArtifact {
    /// External tracking provider's serialized pose graph.
    pub pose_graph: Bytes,
    /// Creation-order anchor list, passed through untouched.
    pub anchors: Vec<AnchorRecord>,
    /// Optional PNG preview, recoverable without the pose graph.
    pub preview: Option<Bytes>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("artifact truncated: needed {needed} bytes, had {remaining}")]
    Truncated { needed: usize, remaining: usize },

    #[error("artifact magic mismatch: got {got:#010x}")]
    BadMagic { got: u32 },

    #[error("artifact format version {got} unsupported (max {max})")]
    UnsupportedVersion { got: u8, max: u8 },

    #[error("section length {got} exceeds limit {max}")]
    SectionTooLarge { got: usize, max: usize },

    #[error("{section} section crc mismatch: expected {expected:#010x}, got {got:#010x}")]
    CrcMismatch {
        section: &'static str,
        expected: u32,
        got: u32,
    },

    #[error("anchor list is malformed: {0}")]
    Anchors(#[from] minicbor::decode::Error),
}

impl DecodeError {
    pub fn transience(&self) -> Transience {
        // Malformed bytes never become well-formed on retry.
        Transience::Permanent
    }
}

/// Serialize an artifact. Framing is deterministic for identical input;
/// byte-for-byte stability of the pose graph itself is the provider's
/// concern, not ours.
pub fn encode(artifact: &MapArtifact) -> Vec<u8> {
    let anchors = minicbor::to_vec(&artifact.anchors).expect("vec write is infallible");

    let mut out = Vec::with_capacity(
        HEADER_LEN
            + SECTION_HEADER_LEN * 3
            + artifact.pose_graph.len()
            + anchors.len()
            + artifact.preview.as_ref().map_or(0, |p| p.len()),
    );
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    let mut flags = 0u8;
    if artifact.preview.is_some() {
        flags |= FLAG_PREVIEW;
    }
    out.push(flags);

    write_section(&mut out, &artifact.pose_graph);
    write_section(&mut out, &anchors);
    if let Some(preview) = &artifact.preview {
        write_section(&mut out, preview);
    }
    out
}

/// Deserialize a full artifact.
pub fn decode(bytes: &[u8]) -> Result<MapArtifact, DecodeError> {
    let mut cursor = Header::parse(bytes)?;

    let pose_graph = cursor.section("pose-graph")?;
    let anchors_raw = cursor.section("anchors")?;
    let preview = if cursor.has_preview {
        Some(Bytes::copy_from_slice(cursor.section("preview")?))
    } else {
        None
    };

    let anchors: Vec<AnchorRecord> = minicbor::decode(anchors_raw)?;
    Ok(MapArtifact {
        pose_graph: Bytes::copy_from_slice(pose_graph),
        anchors,
        preview,
    })
}

/// Recover the anchor list and preview without validating or materializing
/// the pose graph body. Used when importing a world just to list its anchors
/// without restoring AR state.
pub fn decode_anchors_only(
    bytes: &[u8],
) -> Result<(Vec<AnchorRecord>, Option<Bytes>), DecodeError> {
    let mut cursor = Header::parse(bytes)?;

    cursor.skip_section()?;
    let anchors_raw = cursor.section("anchors")?;
    let preview = if cursor.has_preview {
        Some(Bytes::copy_from_slice(cursor.section("preview")?))
    } else {
        None
    };

    let anchors: Vec<AnchorRecord> = minicbor::decode(anchors_raw)?;
    Ok((anchors, preview))
}

fn write_section(out: &mut Vec<u8>, body: &[u8]) {
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&crc32c(body).to_le_bytes());
    out.extend_from_slice(body);
}

struct Header<'a> {
    rest: &'a [u8],
    has_preview: bool,
}

impl<'a> Header<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::Truncated {
                needed: HEADER_LEN,
                remaining: bytes.len(),
            });
        }
        if bytes[..4] != MAGIC {
            return Err(DecodeError::BadMagic {
                got: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            });
        }
        let version = bytes[4];
        if version == 0 || version > VERSION {
            return Err(DecodeError::UnsupportedVersion {
                got: version,
                max: VERSION,
            });
        }
        let flags = bytes[5];
        Ok(Self {
            rest: &bytes[HEADER_LEN..],
            has_preview: flags & FLAG_PREVIEW != 0,
        })
    }

    fn section_header(&mut self) -> Result<(usize, u32), DecodeError> {
        if self.rest.len() < SECTION_HEADER_LEN {
            return Err(DecodeError::Truncated {
                needed: SECTION_HEADER_LEN,
                remaining: self.rest.len(),
            });
        }
        let len = u32::from_le_bytes([self.rest[0], self.rest[1], self.rest[2], self.rest[3]])
            as usize;
        let crc = u32::from_le_bytes([self.rest[4], self.rest[5], self.rest[6], self.rest[7]]);
        if len > MAX_SECTION_BYTES {
            return Err(DecodeError::SectionTooLarge {
                got: len,
                max: MAX_SECTION_BYTES,
            });
        }
        self.rest = &self.rest[SECTION_HEADER_LEN..];
        if self.rest.len() < len {
            return Err(DecodeError::Truncated {
                needed: len,
                remaining: self.rest.len(),
            });
        }
        Ok((len, crc))
    }

    fn section(&mut self, name: &'static str) -> Result<&'a [u8], DecodeError> {
        let (len, expected) = self.section_header()?;
        let body = &self.rest[..len];
        self.rest = &self.rest[len..];
        let got = crc32c(body);
        if got != expected {
            return Err(DecodeError::CrcMismatch {
                section: name,
                expected,
                got,
            });
        }
        Ok(body)
    }

    fn skip_section(&mut self) -> Result<(), DecodeError> {
        let (len, _) = self.section_header()?;
        self.rest = &self.rest[len..];
        Ok(())
    }
}
