//! End-to-end reconciliation behavior over a real temp directory and the
//! in-process remote store.

use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use waymark::catalog::WorldCatalog;
use waymark::config::Limits;
use waymark::core::{Timestamp, Transform, WorldName};
use waymark::store::{LocalMapStore, MemoryRemote, RemoteError, RemoteMapStore};
use waymark::sync::SyncError;
use waymark::{AnchorRecord, MapArtifact, SyncReconciler};

fn name(s: &str) -> WorldName {
    WorldName::parse(s).unwrap()
}

fn artifact(world: &str, anchor_names: &[&str], preview: Option<&[u8]>) -> MapArtifact {
    MapArtifact {
        pose_graph: Bytes::from_static(b"pose-graph-from-tracking-provider"),
        anchors: anchor_names
            .iter()
            .map(|n| AnchorRecord::new(*n, Transform::IDENTITY, world))
            .collect(),
        preview: preview.map(Bytes::copy_from_slice),
    }
}

struct Rig {
    _dir: TempDir,
    local: LocalMapStore,
    remote: Arc<MemoryRemote>,
    reconciler: SyncReconciler,
}

fn rig() -> Rig {
    let dir = TempDir::new().unwrap();
    let local = LocalMapStore::open(dir.path()).unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let catalog = WorldCatalog::load(local.clone());
    let reconciler = SyncReconciler::new(local.clone(), remote.clone(), catalog);
    Rig {
        _dir: dir,
        local,
        remote,
        reconciler,
    }
}

fn anchor_names(artifact: &MapArtifact) -> Vec<&str> {
    artifact.anchors.iter().map(|a| a.name.as_str()).collect()
}

#[test]
fn save_then_resolve_round_trips_anchors_and_pose_graph() {
    let rig = rig();
    let den = name("Den");
    let original = artifact("Den", &["chair 🪑", "lamp"], None);

    let outcome = rig.reconciler.save(&den, &original, Timestamp(100)).unwrap();
    assert!(outcome.is_synced());

    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["chair 🪑", "lamp"]);
    assert_eq!(loaded.pose_graph, original.pose_graph);

    let record = rig.reconciler.world(&den).unwrap();
    assert_eq!(record.last_modified, Timestamp(100));
    assert!(record.remote_ref.is_some());
}

#[test]
fn delete_unknown_world_is_idempotent() {
    let rig = rig();
    let ghost = name("Ghost");

    rig.reconciler.delete(&ghost).unwrap();
    let worlds_after_first = rig.reconciler.worlds();
    rig.reconciler.delete(&ghost).unwrap();

    assert_eq!(rig.reconciler.worlds(), worlds_after_first);
    assert!(rig.reconciler.worlds().is_empty());
}

#[test]
fn upload_failure_degrades_to_local_only() {
    let rig = rig();
    let den = name("Den");
    rig.remote.fail_next_upload();

    let outcome = rig
        .reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(50))
        .unwrap();
    assert!(!outcome.is_synced());

    // The local copy is durable and resolvable despite the failed upload.
    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["lamp"]);
    assert_eq!(rig.remote.record_count(), 0);

    // A later save catches the remote up.
    let outcome = rig
        .reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(51))
        .unwrap();
    assert!(outcome.is_synced());
    assert_eq!(rig.remote.record_count(), 1);
}

#[test]
fn local_wins_timestamp_ties() {
    let rig = rig();
    let den = name("Den");
    rig.reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(200))
        .unwrap();

    // Remote holds a same-timestamp copy with different content.
    let newer = waymark::codec::encode(&artifact("Den", &["mirror"], None));
    rig.remote.upload(&den, &newer, Timestamp(200)).unwrap();

    let synced = rig.reconciler.check_and_sync_if_newer(&den).unwrap();
    assert!(!synced);
    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["lamp"]);
}

#[test]
fn strictly_newer_remote_overwrites_local() {
    let rig = rig();
    let den = name("Den");
    rig.reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(200))
        .unwrap();

    let newer = waymark::codec::encode(&artifact("Den", &["mirror"], None));
    rig.remote.upload(&den, &newer, Timestamp(201)).unwrap();

    let synced = rig.reconciler.check_and_sync_if_newer(&den).unwrap();
    assert!(synced);
    assert_eq!(
        rig.reconciler.world(&den).unwrap().last_modified,
        Timestamp(201)
    );
    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["mirror"]);
}

#[test]
fn resolve_finds_artifact_the_catalog_never_recorded() {
    // Simulates a crash after the local write but before the catalog
    // update: the artifact file exists, the snapshot knows nothing.
    let rig = rig();
    let den = name("Den");
    let bytes = waymark::codec::encode(&artifact("Den", &["lamp"], None));
    rig.local.write_artifact(&den, &bytes).unwrap();

    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["lamp"]);
    // The catalog entry was rebuilt as a side effect.
    assert!(rig.reconciler.world(&den).is_some());
}

#[test]
fn corrupt_local_artifact_falls_back_to_remote() {
    let rig = rig();
    let den = name("Den");
    rig.reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(10))
        .unwrap();

    // Clobber the local file; remote still holds the good copy.
    rig.local.write_artifact(&den, b"garbage").unwrap();

    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["lamp"]);
}

#[test]
fn resolve_unknown_world_everywhere_is_not_found() {
    let rig = rig();
    let err = rig.reconciler.resolve(&name("Atlantis")).unwrap_err();
    assert!(matches!(err, SyncError::WorldNotFound { .. }));
}

#[test]
fn resolve_downloads_remotely_discovered_world() {
    let rig = rig();
    let attic = name("Attic");
    let bytes = waymark::codec::encode(&artifact("Attic", &["boxes"], None));
    rig.remote.upload(&attic, &bytes, Timestamp(77)).unwrap();

    // Catalog is empty; resolve must discover, download, and cache.
    let loaded = rig.reconciler.resolve(&attic).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["boxes"]);
    assert!(rig.local.artifact_exists(&attic));
    assert_eq!(
        rig.reconciler.world(&attic).unwrap().last_modified,
        Timestamp(77)
    );
}

#[test]
fn refresh_catalog_merges_remote_stubs() {
    let rig = rig();
    rig.remote
        .upload(&name("Attic"), b"whatever", Timestamp(5))
        .unwrap();
    rig.remote
        .upload(&name("Basement"), b"whatever", Timestamp(6))
        .unwrap();

    assert_eq!(rig.reconciler.refresh_catalog().unwrap(), 2);
    assert_eq!(rig.reconciler.refresh_catalog().unwrap(), 0);
    assert_eq!(rig.reconciler.worlds().len(), 2);
}

#[test]
fn rename_moves_world_anchors_and_preview() {
    let rig = rig();
    let garage = name("Garage");
    let workshop = name("Workshop");
    rig.reconciler
        .save(
            &garage,
            &artifact("Garage", &["toolbox 🧰"], Some(b"\x89PNG preview")),
            Timestamp(300),
        )
        .unwrap();

    rig.reconciler.rename(&garage, &workshop).unwrap();

    let err = rig.reconciler.resolve(&garage).unwrap_err();
    assert!(matches!(err, SyncError::WorldNotFound { .. }));
    assert!(rig.reconciler.world(&garage).is_none());

    let loaded = rig.reconciler.resolve(&workshop).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["toolbox 🧰"]);
    assert_eq!(
        rig.local.read_preview(&workshop).as_deref(),
        Some(b"\x89PNG preview".as_slice())
    );
    assert!(rig.local.read_preview(&garage).is_none());

    // The old remote record is gone before rename returns, so a catalog
    // refresh cannot re-import the old name.
    assert!(matches!(
        rig.remote.fetch_metadata(&garage),
        Err(RemoteError::NotFound { .. })
    ));
    assert_eq!(rig.remote.record_count(), 1);
    assert_eq!(rig.reconciler.refresh_catalog().unwrap(), 0);
    assert!(rig.reconciler.world(&garage).is_none());
}

#[test]
fn rename_to_same_name_is_a_no_op() {
    let rig = rig();
    let den = name("Den");
    rig.reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(10))
        .unwrap();

    rig.reconciler.rename(&den, &den).unwrap();

    let loaded = rig.reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["lamp"]);
    assert_eq!(rig.remote.record_count(), 1);
    assert!(rig.reconciler.world(&den).is_some());
}

#[test]
fn delete_removes_local_state_even_when_remote_is_down() {
    let rig = rig();
    let den = name("Den");
    rig.reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(10))
        .unwrap();

    rig.remote.set_offline(true);
    rig.reconciler.delete(&den).unwrap();

    assert!(rig.reconciler.world(&den).is_none());
    assert!(!rig.local.artifact_exists(&den));

    // Wait for the background delete to fail before restoring the remote.
    let waymark::sync::RemoteOutcome::Deleted(_, result) = rig
        .reconciler
        .remote_outcomes()
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap();
    assert!(result.is_err());

    // The remote record is eventually-consistent garbage, rediscoverable by
    // a later listing.
    rig.remote.set_offline(false);
    assert_eq!(rig.reconciler.refresh_catalog().unwrap(), 1);
}

#[test]
fn peek_anchors_lists_without_local_copy() {
    let rig = rig();
    let attic = name("Attic");
    let bytes = waymark::codec::encode(&artifact("Attic", &["boxes", "sled"], None));
    rig.remote.upload(&attic, &bytes, Timestamp(3)).unwrap();

    let anchors = rig.reconciler.peek_anchors(&attic).unwrap();
    assert_eq!(anchors.len(), 2);
    // Peeking is read-only: nothing was cached or cataloged.
    assert!(!rig.local.artifact_exists(&attic));
    assert!(rig.reconciler.world(&attic).is_none());
}

#[test]
fn mark_collaborative_requires_synced_world() {
    let rig = rig();
    let den = name("Den");
    assert!(rig.reconciler.mark_collaborative(&den).is_err());

    rig.reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(10))
        .unwrap();
    rig.reconciler.mark_collaborative(&den).unwrap();
    let record = rig.reconciler.world(&den).unwrap();
    assert!(record.is_collaborative);
    assert!(record.remote_ref.is_some());
}

#[test]
fn concurrent_saves_for_one_name_serialize() {
    let rig = rig();
    let reconciler = Arc::new(rig.reconciler);
    let den = name("Den");

    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            let reconciler = reconciler.clone();
            let den = den.clone();
            std::thread::spawn(move || {
                reconciler
                    .save(&den, &artifact("Den", &["lamp"], None), Timestamp(100 + i))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Whatever order won, the artifact decodes cleanly and the catalog holds
    // exactly one record for the name.
    let loaded = reconciler.resolve(&den).unwrap();
    assert_eq!(anchor_names(&loaded), vec!["lamp"]);
    assert_eq!(reconciler.worlds().len(), 1);
}

#[test]
fn oversized_artifact_is_refused_before_any_write() {
    let dir = TempDir::new().unwrap();
    let local = LocalMapStore::open(dir.path()).unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let catalog = WorldCatalog::load(local.clone());
    let limits = Limits {
        max_artifact_bytes: 16,
        ..Limits::default()
    };
    let reconciler = SyncReconciler::with_limits(local.clone(), remote.clone(), catalog, limits);
    let den = name("Den");

    let err = reconciler
        .save(&den, &artifact("Den", &["lamp"], None), Timestamp(1))
        .unwrap_err();
    assert!(matches!(err, SyncError::ArtifactTooLarge { .. }));
    assert!(!local.artifact_exists(&den));
    assert!(reconciler.world(&den).is_none());
    assert_eq!(remote.record_count(), 0);
}

#[test]
fn catalog_survives_reconciler_restart() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let den = name("Den");

    {
        let local = LocalMapStore::open(dir.path()).unwrap();
        let catalog = WorldCatalog::load(local.clone());
        let reconciler = SyncReconciler::new(local, remote.clone(), catalog);
        reconciler
            .save(&den, &artifact("Den", &["lamp"], None), Timestamp(10))
            .unwrap();
        reconciler.shutdown();
    }

    let local = LocalMapStore::open(dir.path()).unwrap();
    let catalog = WorldCatalog::load(local.clone());
    let reconciler = SyncReconciler::new(local, remote, catalog);
    let record = reconciler.world(&den).unwrap();
    assert_eq!(record.last_modified, Timestamp(10));
    assert!(record.remote_ref.is_some());
}
