//! Collaborative anchor pull and interactive placement.
//!
//! Both operations sit behind the relocalization gate: nothing touches the
//! session's anchor set until the pose provider is tracking the restored
//! map. Imported remote anchors keep their names (duplicates are skipped,
//! never renamed); only interactive placement runs collision resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Limits;
use crate::core::{
    compute_new_anchors, unique_name, validate_anchor_name, AnchorRecord, RemoteRef, Transform,
};
use crate::store::{AnchorCursor, RemoteMapStore};
use crate::sync::SyncError;

use super::reloc::RelocalizationStateMachine;
use super::SessionError;

/// What a collaborative pull produced.
#[derive(Debug, PartialEq)]
pub enum ImportOutcome {
    /// Relocalization has not settled; nothing was fetched.
    NotReady,
    /// Anchors to hand to the pose provider, possibly empty.
    Added(Vec<AnchorRecord>),
}

/// Incremental importer for one collaborative world.
///
/// The cursor advances only after a successful fetch, so a failed pull is
/// retried from the same position next time.
pub struct AnchorImporter {
    remote: Arc<dyn RemoteMapStore>,
    world: RemoteRef,
    cursor: AnchorCursor,
}

impl AnchorImporter {
    pub fn new(remote: Arc<dyn RemoteMapStore>, world: RemoteRef) -> Self {
        Self {
            remote,
            world,
            cursor: AnchorCursor::default(),
        }
    }

    pub fn cursor(&self) -> AnchorCursor {
        self.cursor
    }

    /// Fetch anchors added remotely since the last pull and select the ones
    /// missing from the session. Gated on relocalization.
    pub fn pull(
        &mut self,
        reloc: &RelocalizationStateMachine,
        session_names: &BTreeSet<String>,
    ) -> Result<ImportOutcome, SyncError> {
        if !reloc.world_is_loaded() {
            debug!("anchor import skipped, relocalization incomplete");
            return Ok(ImportOutcome::NotReady);
        }

        let (records, next) = self.remote.fetch_incremental_anchors(self.world, self.cursor)?;
        self.cursor = next;

        let added = compute_new_anchors(records, session_names);
        if !added.is_empty() {
            info!(count = added.len(), "imported collaborative anchors");
        }
        Ok(ImportOutcome::Added(added))
    }
}

/// Build the record for an interactively placed anchor, resolving name
/// collisions against the current session. Refused while relocalization is
/// incomplete or the label fails validation against the configured limits.
pub fn place_anchor(
    reloc: &RelocalizationStateMachine,
    session_names: &BTreeSet<String>,
    base_name: &str,
    transform: Transform,
    origin_world: &str,
    limits: &Limits,
) -> Result<AnchorRecord, SessionError> {
    if !reloc.world_is_loaded() {
        return Err(SessionError::NotTracking);
    }
    validate_anchor_name(base_name, limits.max_anchor_name_len)?;
    let name = unique_name(base_name.trim(), session_names);
    Ok(AnchorRecord::new(name, transform, origin_world))
}
