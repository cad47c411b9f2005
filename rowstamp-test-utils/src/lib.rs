//! Rowstamp Test Utilities
//!
//! Centralized test infrastructure for the rowstamp workspace:
//! - The `Thing` fixture entity
//! - Store constructors for both backends
//! - Proptest generators
//! - Custom assertions for store results

pub use rowstamp_core::{
    Record, RecordId, RecordUpdate, RetryConfig, StoreConfig, StoreError, StoreResult,
    VersionToken,
};
pub use rowstamp_storage::{InMemoryBackend, LmdbBackend, RecordStore, VersionedRecordStore};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route store log events to the test harness, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FIXTURE ENTITY
// ============================================================================

/// Minimal named entity used across store tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub name: String,
}

impl Thing {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ============================================================================
// STORE CONSTRUCTORS
// ============================================================================

pub mod fixtures {
    //! Pre-built stores for common testing scenarios.

    use super::*;

    /// Timeout used by fixture stores; long enough for contended tests.
    pub const TEST_OP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Fresh in-memory store.
    pub fn memory_store<F>() -> VersionedRecordStore<F, InMemoryBackend> {
        init_test_tracing();
        let config = StoreConfig::default().with_op_timeout(TEST_OP_TIMEOUT);
        match VersionedRecordStore::with_config(InMemoryBackend::new(), &config) {
            Ok(store) => store,
            Err(e) => panic!("fixture config should be valid: {}", e),
        }
    }

    /// Fresh LMDB store in a new temporary directory.
    ///
    /// Keep the returned `TempDir` alive for as long as the store is used.
    pub fn lmdb_store<F>() -> (VersionedRecordStore<F, LmdbBackend>, TempDir) {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("TempDir creation should succeed: {}", e),
        };
        let store = lmdb_store_at(&dir);
        (store, dir)
    }

    /// LMDB store in an existing directory, for reopen tests.
    pub fn lmdb_store_at<F>(dir: &TempDir) -> VersionedRecordStore<F, LmdbBackend> {
        init_test_tracing();
        let config = StoreConfig::default()
            .with_op_timeout(TEST_OP_TIMEOUT)
            .with_data_dir(dir.path());
        match VersionedRecordStore::open_lmdb(&config) {
            Ok(store) => store,
            Err(e) => panic!("LMDB store should open: {}", e),
        }
    }

    /// Create the `Thing` named "First" in `store`.
    pub fn store_with_first<S>(store: &S) -> Record<Thing>
    where
        S: RecordStore<Thing> + ?Sized,
    {
        match store.create(Thing::named("First")) {
            Ok(record) => record,
            Err(e) => panic!("create should succeed: {}", e),
        }
    }

    /// Retry policy with millisecond backoff for fast tests.
    pub fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for rowstamp types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random RecordId (not necessarily v7).
    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        any::<[u8; 16]>().prop_map(|bytes| RecordId::from_uuid(uuid::Uuid::from_bytes(bytes)))
    }

    /// Generate a valid (non-empty) version token.
    pub fn arb_version_token() -> impl Strategy<Value = VersionToken> {
        any::<[u8; 16]>()
            .prop_filter("token must not be all zero", |b| *b != [0u8; 16])
            .prop_map(|b| match VersionToken::from_bytes(b) {
                Ok(token) => token,
                Err(e) => panic!("filtered bytes must form a token: {}", e),
            })
    }

    /// Generate a short printable name.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,23}"
    }

    /// Generate a Thing.
    pub fn arb_thing() -> impl Strategy<Value = Thing> {
        arb_name().prop_map(|name| Thing { name })
    }

    /// Generate a sequence of renames to apply to one record.
    pub fn arb_renames(max: usize) -> impl Strategy<Value = Vec<Thing>> {
        prop::collection::vec(arb_thing(), 1..max.max(2))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for store results.

    use super::*;

    /// Assert that a StoreResult is Ok and return the value.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: StoreResult<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    }

    /// Assert that a StoreResult is a ConcurrencyConflict on `id`.
    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &StoreResult<T>, id: RecordId) {
        match result {
            Err(StoreError::ConcurrencyConflict { id: got, .. }) => {
                assert_eq!(*got, id, "Wrong record id in ConcurrencyConflict");
            }
            other => panic!("Expected ConcurrencyConflict for {}, got: {:?}", id, other),
        }
    }

    /// Assert that a StoreResult is NotFound for `id`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StoreResult<T>, id: RecordId) {
        match result {
            Err(StoreError::NotFound { id: got }) => {
                assert_eq!(*got, id, "Wrong record id in NotFound");
            }
            other => panic!("Expected NotFound for {}, got: {:?}", id, other),
        }
    }

    /// Assert that a StoreResult is StorageUnavailable.
    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &StoreResult<T>) {
        match result {
            Err(StoreError::StorageUnavailable { .. }) => {}
            other => panic!("Expected StorageUnavailable, got: {:?}", other),
        }
    }

    /// Assert that the stored record is exactly `expected`, version included.
    #[track_caller]
    pub fn assert_unchanged<F, S>(store: &S, expected: &Record<F>)
    where
        F: std::fmt::Debug + PartialEq,
        S: RecordStore<F> + ?Sized,
    {
        match store.read(expected.id) {
            Ok(current) => assert_eq!(&current, expected, "Record changed unexpectedly"),
            Err(e) => panic!("Expected record {} to be readable, got: {:?}", expected.id, e),
        }
    }
}
