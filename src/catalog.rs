//! World catalog: the single source of truth for known worlds.
//!
//! In-memory registry backed by the local store's snapshot file. Every
//! mutating call persists the snapshot before returning (write-through), so
//! the on-disk catalog never trails the in-memory one. The catalog is the
//! only writer of that file.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::{RemoteRef, WorldName, WorldRecord};
use crate::store::{LocalMapStore, StoreError};

pub struct WorldCatalog {
    records: BTreeMap<WorldName, WorldRecord>,
    store: LocalMapStore,
}

impl WorldCatalog {
    /// Load the catalog from the store's snapshot. Duplicate names in the
    /// snapshot are dropped silently, first record wins.
    pub fn load(store: LocalMapStore) -> Self {
        let mut records = BTreeMap::new();
        for record in store.read_catalog_snapshot() {
            if records.contains_key(&record.name) {
                debug!(world = %record.name, "duplicate catalog entry dropped");
                continue;
            }
            records.insert(record.name.clone(), record);
        }
        Self { records, store }
    }

    pub fn find(&self, name: &WorldName) -> Option<&WorldRecord> {
        self.records.get(name)
    }

    /// All records, name-ordered. Never contains two records with the same
    /// name (keys are unique by construction).
    pub fn all(&self) -> Vec<WorldRecord> {
        self.records.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn upsert(&mut self, record: WorldRecord) -> Result<(), StoreError> {
        self.records.insert(record.name.clone(), record);
        self.persist()
    }

    pub fn remove(&mut self, name: &WorldName) -> Result<Option<WorldRecord>, StoreError> {
        let removed = self.records.remove(name);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn mark_collaborative(
        &mut self,
        name: &WorldName,
        remote_ref: RemoteRef,
    ) -> Result<(), StoreError> {
        if let Some(record) = self.records.get_mut(name) {
            record.is_collaborative = true;
            record.remote_ref = Some(remote_ref);
            self.persist()?;
        }
        Ok(())
    }

    /// Merge metadata-only stubs for remotely discovered worlds. Known names
    /// are left untouched (first-encountered record wins).
    pub fn merge_stubs(
        &mut self,
        stubs: impl IntoIterator<Item = WorldRecord>,
    ) -> Result<usize, StoreError> {
        let mut added = 0;
        for stub in stubs {
            if self.records.contains_key(&stub.name) {
                continue;
            }
            self.records.insert(stub.name.clone(), stub);
            added += 1;
        }
        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let snapshot: Vec<WorldRecord> = self.records.values().cloned().collect();
        self.store.write_catalog_snapshot(&snapshot)
    }
}
