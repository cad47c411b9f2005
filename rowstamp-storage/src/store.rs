//! Versioned record store.
//!
//! Every record carries a [`VersionToken`]. Writes name the version the
//! caller last read; the store compares it against the stored version and
//! applies the write only on an exact match, inside a single backend
//! transaction.
//!
//! # State Transitions
//!
//! ```text
//! Absent ── create ──→ Live(v1) ── update(v1) ──→ Live(v2) ── ... ── delete(vn) ──→ Absent
//! ```
//!
//! `update` and `delete` against a stale version fail with
//! `ConcurrencyConflict` and leave the record untouched. Against a removed
//! id they fail with `NotFound`. The store never retries on its own.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use rowstamp_core::{
    Record, RecordId, RecordUpdate, RowstampResult, StoreConfig, StoreError, StoreResult,
    VersionToken,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::backend::{KvRead, StorageBackend};
use crate::codec;
use crate::lmdb::LmdbBackend;
use crate::memory::InMemoryBackend;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Optimistic-concurrency record operations.
pub trait RecordStore<F>: Send + Sync {
    /// Persist `fields` as a new record with a fresh id and version.
    fn create(&self, fields: F) -> StoreResult<Record<F>>;

    /// Get the current state of a record. Never changes its version.
    fn read(&self, id: RecordId) -> StoreResult<Record<F>>;

    /// Replace the fields of `id` if it is still at `expected`.
    fn update(&self, id: RecordId, expected: VersionToken, fields: F) -> StoreResult<Record<F>>;

    /// Remove `id` if it is still at `expected`.
    fn delete(&self, id: RecordId, expected: VersionToken) -> StoreResult<()>;

    /// Submit a write intent captured with [`Record::to_update`].
    fn apply(&self, update: RecordUpdate<F>) -> StoreResult<Record<F>> {
        self.update(update.id, update.expected_version, update.fields)
    }
}

// ============================================================================
// VERSIONED RECORD STORE
// ============================================================================

/// Record store enforcing version checks on every write.
///
/// # Example
///
/// ```
/// use rowstamp_storage::{RecordStore, VersionedRecordStore};
///
/// let store = VersionedRecordStore::<String>::in_memory();
/// let first = store.create("First".to_string()).unwrap();
///
/// let second = store.update(first.id, first.version, "Second".to_string()).unwrap();
/// assert_ne!(second.version, first.version);
///
/// // The old version is now stale.
/// let stale = store.update(first.id, first.version, "Third".to_string());
/// assert!(stale.unwrap_err().is_conflict());
/// ```
pub struct VersionedRecordStore<F, B = InMemoryBackend> {
    backend: B,
    op_timeout: Duration,
    _fields: PhantomData<fn() -> F>,
}

impl<F, B: StorageBackend> VersionedRecordStore<F, B> {
    /// Wrap `backend` using the default operation timeout.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            op_timeout: StoreConfig::default().op_timeout,
            _fields: PhantomData,
        }
    }

    /// Wrap `backend` using the timeout from a validated `config`.
    pub fn with_config(backend: B, config: &StoreConfig) -> RowstampResult<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            op_timeout: config.op_timeout,
            _fields: PhantomData,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Timeout applied to operations called directly on the store.
    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    /// A view of this store whose operations use `timeout` instead.
    pub fn with_timeout(&self, timeout: Duration) -> TimedStore<'_, F, B> {
        TimedStore {
            store: self,
            timeout,
        }
    }
}

impl<F> VersionedRecordStore<F, InMemoryBackend> {
    /// Create a store over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(InMemoryBackend::new())
    }
}

impl<F> VersionedRecordStore<F, LmdbBackend> {
    /// Open a durable store in `config.data_dir`.
    pub fn open_lmdb(config: &StoreConfig) -> RowstampResult<Self> {
        let backend = LmdbBackend::open(config)?;
        Self::with_config(backend, config)
    }
}

impl<F, B: fmt::Debug> fmt::Debug for VersionedRecordStore<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedRecordStore")
            .field("backend", &self.backend)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

/// Load and decode the record under `id`, or fail with `NotFound`.
fn load<F, K>(kv: &K, id: &RecordId) -> StoreResult<Record<F>>
where
    F: DeserializeOwned,
    K: KvRead + ?Sized,
{
    let bytes = kv.get(id)?.ok_or(StoreError::NotFound { id: *id })?;
    codec::decode(id, &bytes)
}

/// Reject the write unless the stored version is exactly `expected`.
fn check_version<F>(current: &Record<F>, expected: VersionToken) -> StoreResult<()> {
    if current.version != expected {
        return Err(StoreError::ConcurrencyConflict {
            id: current.id,
            expected,
            actual: current.version,
        });
    }
    Ok(())
}

impl<F, B> VersionedRecordStore<F, B>
where
    F: Serialize + DeserializeOwned,
    B: StorageBackend,
{
    fn create_within(&self, fields: F, timeout: Duration) -> StoreResult<Record<F>> {
        let record = Record::new(fields);
        let id = record.id;
        let bytes = codec::encode(&record)?;

        let result = self
            .backend
            .transactionally(timeout, |kv| kv.put(&id, bytes))
            .map(|()| record);
        self.trace("create", id, &result);
        result
    }

    fn read_within(&self, id: RecordId, timeout: Duration) -> StoreResult<Record<F>> {
        let result = self.backend.read_view(timeout, |kv| load(kv, &id));
        self.trace("read", id, &result);
        result
    }

    fn update_within(
        &self,
        id: RecordId,
        expected: VersionToken,
        fields: F,
        timeout: Duration,
    ) -> StoreResult<Record<F>> {
        let result = self.backend.transactionally(timeout, |kv| {
            let current: Record<F> = load(&*kv, &id)?;
            check_version(&current, expected)?;

            let next = current.revise(fields);
            kv.put(&id, codec::encode(&next)?)?;
            Ok(next)
        });
        self.trace("update", id, &result);
        result
    }

    fn delete_within(
        &self,
        id: RecordId,
        expected: VersionToken,
        timeout: Duration,
    ) -> StoreResult<()> {
        let result = self.backend.transactionally(timeout, |kv| {
            let current: Record<F> = load(&*kv, &id)?;
            check_version(&current, expected)?;

            kv.remove(&id)?;
            Ok(())
        });
        self.trace("delete", id, &result);
        result
    }

    /// Whether a record with `id` currently exists.
    pub fn contains(&self, id: RecordId) -> StoreResult<bool> {
        self.backend
            .read_view(self.op_timeout, |kv| Ok(kv.get(&id)?.is_some()))
    }

    /// Number of live records.
    pub fn len(&self) -> StoreResult<usize> {
        self.backend.len(self.op_timeout)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn trace<T>(&self, op: &'static str, id: RecordId, result: &StoreResult<T>) {
        let backend = self.backend.name();
        match result {
            Ok(_) => tracing::debug!(backend, op, id = %id, "record operation succeeded"),
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!(backend, op, id = %id, "record not found")
            }
            Err(StoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => tracing::debug!(
                backend,
                op,
                id = %id,
                expected = %expected,
                actual = %actual,
                "stale version rejected"
            ),
            Err(StoreError::StorageUnavailable { reason }) => {
                tracing::warn!(backend, op, id = %id, reason = %reason, "storage unavailable")
            }
        }
    }
}

impl<F, B> RecordStore<F> for VersionedRecordStore<F, B>
where
    F: Serialize + DeserializeOwned,
    B: StorageBackend,
{
    fn create(&self, fields: F) -> StoreResult<Record<F>> {
        self.create_within(fields, self.op_timeout)
    }

    fn read(&self, id: RecordId) -> StoreResult<Record<F>> {
        self.read_within(id, self.op_timeout)
    }

    fn update(&self, id: RecordId, expected: VersionToken, fields: F) -> StoreResult<Record<F>> {
        self.update_within(id, expected, fields, self.op_timeout)
    }

    fn delete(&self, id: RecordId, expected: VersionToken) -> StoreResult<()> {
        self.delete_within(id, expected, self.op_timeout)
    }
}

// ============================================================================
// TIMED VIEW
// ============================================================================

/// Borrowed view of a store with a caller-supplied operation timeout.
pub struct TimedStore<'a, F, B> {
    store: &'a VersionedRecordStore<F, B>,
    timeout: Duration,
}

impl<F, B> TimedStore<'_, F, B> {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<F, B> RecordStore<F> for TimedStore<'_, F, B>
where
    F: Serialize + DeserializeOwned,
    B: StorageBackend,
{
    fn create(&self, fields: F) -> StoreResult<Record<F>> {
        self.store.create_within(fields, self.timeout)
    }

    fn read(&self, id: RecordId) -> StoreResult<Record<F>> {
        self.store.read_within(id, self.timeout)
    }

    fn update(&self, id: RecordId, expected: VersionToken, fields: F) -> StoreResult<Record<F>> {
        self.store.update_within(id, expected, fields, self.timeout)
    }

    fn delete(&self, id: RecordId, expected: VersionToken) -> StoreResult<()> {
        self.store.delete_within(id, expected, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Thing {
        name: String,
    }

    fn thing(name: &str) -> Thing {
        Thing {
            name: name.to_string(),
        }
    }

    fn store() -> VersionedRecordStore<Thing> {
        VersionedRecordStore::in_memory()
    }

    #[test]
    fn test_create_assigns_id_and_version() {
        let store = store();
        let record = store.create(thing("First")).unwrap();

        assert_ne!(record.version.as_bytes(), &[0u8; 16]);
        assert_eq!(record.fields, thing("First"));
        assert_eq!(store.read(record.id).unwrap(), record);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_update_rotates_version() {
        let store = store();
        let created = store.create(thing("First")).unwrap();

        let updated = store
            .update(created.id, created.version, thing("Second"))
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_ne!(updated.version, created.version);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(store.read(created.id).unwrap(), updated);
    }

    #[test]
    fn test_update_with_foreign_token_conflicts() {
        let store = store();
        let created = store.create(thing("First")).unwrap();

        let foreign = VersionToken::generate();
        let result = store.update(created.id, foreign, thing("Second"));
        match result {
            Err(StoreError::ConcurrencyConflict {
                id,
                expected,
                actual,
            }) => {
                assert_eq!(id, created.id);
                assert_eq!(expected, foreign);
                assert_eq!(actual, created.version);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(store.read(created.id).unwrap(), created);
    }

    #[test]
    fn test_second_update_with_same_version_conflicts() {
        let store = store();
        let created = store.create(thing("First")).unwrap();

        store
            .update(created.id, created.version, thing("Second"))
            .unwrap();
        let stale = store.update(created.id, created.version, thing("Third"));
        assert!(stale.unwrap_err().is_conflict());
        assert_eq!(store.read(created.id).unwrap().fields, thing("Second"));
    }

    #[test]
    fn test_read_does_not_rotate_version() {
        let store = store();
        let created = store.create(thing("First")).unwrap();
        for _ in 0..5 {
            assert_eq!(store.read(created.id).unwrap().version, created.version);
        }
    }

    #[test]
    fn test_delete_with_stale_version_keeps_record() {
        let store = store();
        let created = store.create(thing("First")).unwrap();
        let updated = store
            .update(created.id, created.version, thing("Second"))
            .unwrap();

        let result = store.delete(created.id, created.version);
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(store.read(created.id).unwrap(), updated);
    }

    #[test]
    fn test_delete_then_writes_are_not_found() {
        let store = store();
        let created = store.create(thing("First")).unwrap();
        store.delete(created.id, created.version).unwrap();

        assert!(!store.contains(created.id).unwrap());
        assert!(store.read(created.id).unwrap_err().is_not_found());
        assert!(store
            .update(created.id, created.version, thing("Second"))
            .unwrap_err()
            .is_not_found());
        assert!(store
            .delete(created.id, created.version)
            .unwrap_err()
            .is_not_found());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_apply_uses_captured_version() {
        let store = store();
        let created = store.create(thing("First")).unwrap();
        let intent = created.to_update(thing("Second"));

        let updated = store.apply(intent.clone()).unwrap();
        assert_eq!(updated.fields, thing("Second"));
        assert!(store.apply(intent).unwrap_err().is_conflict());
    }

    #[test]
    fn test_timed_view_reports_timeout_as_unavailable() {
        let store = store();
        let created = store.create(thing("First")).unwrap();

        let view = store.with_timeout(Duration::from_millis(10));
        assert_eq!(view.timeout(), Duration::from_millis(10));

        let result = store.backend().transactionally(Duration::from_secs(1), |_| {
            view.update(created.id, created.version, thing("Second"))
        });
        assert!(matches!(
            result,
            Err(StoreError::StorageUnavailable { .. })
        ));
        assert_eq!(store.read(created.id).unwrap(), created);
    }

    #[test]
    fn test_with_config_rejects_invalid_config() {
        let config = StoreConfig::default().with_op_timeout(Duration::ZERO);
        let result = VersionedRecordStore::<Thing, _>::with_config(InMemoryBackend::new(), &config);
        assert!(result.is_err());
    }
}
