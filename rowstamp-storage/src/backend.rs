//! Storage backend capability.
//!
//! The store needs exactly two things from a storage medium: a consistent
//! read view, and a way to run a read-compare-write block atomically. Any
//! medium that provides both (an embedded KV store, a relational table
//! with a version column, a remote KV with CAS) can sit under a
//! [`VersionedRecordStore`](crate::VersionedRecordStore).
//!
//! Values are opaque bytes keyed by [`RecordId`]; encoding is the store's
//! concern (see [`crate::codec`]).

use rowstamp_core::{RecordId, StoreResult};
use std::time::Duration;

/// Read access to a consistent snapshot.
pub trait KvRead {
    /// Fetch the encoded record stored under `id`.
    fn get(&self, id: &RecordId) -> StoreResult<Option<Vec<u8>>>;
}

/// Write access inside a transaction.
///
/// Writes are staged: nothing becomes visible to other callers until the
/// enclosing [`StorageBackend::transactionally`] block returns `Ok`.
/// Reads through the same handle observe the staged writes.
pub trait KvWrite: KvRead {
    /// Stage `bytes` as the new value for `id`.
    fn put(&mut self, id: &RecordId, bytes: Vec<u8>) -> StoreResult<()>;

    /// Stage removal of `id`. Returns whether a value was present.
    fn remove(&mut self, id: &RecordId) -> StoreResult<bool>;
}

/// Storage capability required by the versioned store.
///
/// # Atomicity
///
/// `transactionally` must give `f` exclusive write access for its whole
/// duration, so a comparison made inside `f` still holds when its writes
/// commit. If `f` returns `Err`, every staged write is discarded.
///
/// # Timeouts
///
/// Both methods must give up with `StorageUnavailable` rather than wait
/// longer than `timeout` for access to the medium.
pub trait StorageBackend: Send + Sync {
    /// Run `f` against a consistent snapshot.
    fn read_view<R, F>(&self, timeout: Duration, f: F) -> StoreResult<R>
    where
        F: FnOnce(&dyn KvRead) -> StoreResult<R>;

    /// Run `f` atomically: all of its writes commit, or none do.
    fn transactionally<R, F>(&self, timeout: Duration, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut dyn KvWrite) -> StoreResult<R>;

    /// Number of live records.
    fn len(&self, timeout: Duration) -> StoreResult<usize>;

    /// Short backend name for log events.
    fn name(&self) -> &'static str;
}
