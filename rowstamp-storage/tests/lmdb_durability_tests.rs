//! Version stamps persisted by the LMDB backend survive a reopen.

use rowstamp_storage::{RecordStore, StoreConfig, VersionedRecordStore};
use rowstamp_test_utils::assertions::*;
use rowstamp_test_utils::fixtures::*;
use rowstamp_test_utils::{LmdbBackend, Thing};
use tempfile::TempDir;

#[test]
fn stamp_survives_reopen() {
    let dir = TempDir::new().expect("TempDir creation should succeed");

    let (first, second) = {
        let store = lmdb_store_at::<Thing>(&dir);
        let first = store_with_first(&store);
        let second = assert_ok(store.update(first.id, first.version, Thing::named("Second")));
        store.backend().sync().expect("sync should succeed");
        (first, second)
    };

    let reopened = lmdb_store_at::<Thing>(&dir);
    assert_unchanged(&reopened, &second);

    // The pre-reopen stale token is still stale.
    let replay = reopened.update(first.id, first.version, Thing::named("Replay"));
    assert_conflict(&replay, first.id);

    let third = assert_ok(reopened.update(second.id, second.version, Thing::named("Third")));
    assert_ne!(third.version, second.version);
}

#[test]
fn delete_survives_reopen() {
    let dir = TempDir::new().expect("TempDir creation should succeed");

    let first = {
        let store = lmdb_store_at::<Thing>(&dir);
        let first = store_with_first(&store);
        assert_ok(store.delete(first.id, first.version));
        first
    };

    let reopened = lmdb_store_at::<Thing>(&dir);
    assert_not_found(&reopened.read(first.id), first.id);
    assert!(reopened.is_empty().expect("len should succeed"));
}

#[test]
fn open_without_data_dir_is_config_error() {
    let result = VersionedRecordStore::<Thing, LmdbBackend>::open_lmdb(&StoreConfig::default());
    assert!(matches!(
        result,
        Err(rowstamp_storage::RowstampError::Config(_))
    ));
}

#[test]
fn records_of_different_shapes_do_not_decode_as_each_other() {
    let dir = TempDir::new().expect("TempDir creation should succeed");

    let id = {
        let store = lmdb_store_at::<Thing>(&dir);
        store_with_first(&store).id
    };

    // Reading the same bytes as an incompatible payload is a storage fault,
    // never a silently defaulted record.
    let numbers = lmdb_store_at::<Vec<u64>>(&dir);
    assert_unavailable(&numbers.read(id));
}
