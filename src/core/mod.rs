//! Domain layer: time, anchors, worlds, merge rules.
//!
//! Pure data and logic. Nothing in this module touches disk or network.

pub mod anchor;
pub mod error;
pub mod merge;
pub mod time;
pub mod world;

pub use anchor::{split_trailing_emoji, validate_anchor_name, AnchorRecord, Transform, GUIDE_ANCHOR};
pub use error::{CoreError, InvalidName};
pub use merge::{compute_new_anchors, unique_name};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use world::{RemoteRef, WorldName, WorldRecord};
