//! Async facade over the versioned record store.
//!
//! This trait provides an async alternative to the synchronous
//! [`RecordStore`]. Each call runs the blocking store operation on tokio's
//! blocking pool, so async callers never stall a runtime worker on a
//! backend lock.
//!
//! The deadline is the store's `op_timeout`, enforced by the backend while
//! it waits for access. Once a write has access it runs to completion and
//! its outcome is always reported, so `StorageUnavailable` from this facade
//! means nothing was written.

use std::sync::Arc;

use ::async_trait::async_trait;
use rowstamp_core::{Record, RecordId, StoreError, StoreResult, VersionToken};
use serde::{de::DeserializeOwned, Serialize};

use crate::backend::StorageBackend;
use crate::store::{RecordStore, VersionedRecordStore};

/// Async record operations with per-call deadlines.
#[async_trait]
pub trait AsyncRecordStore<F: Send + 'static>: Send + Sync {
    /// Persist `fields` as a new record.
    async fn create(&self, fields: F) -> StoreResult<Record<F>>;

    /// Get the current state of a record.
    async fn read(&self, id: RecordId) -> StoreResult<Record<F>>;

    /// Replace the fields of `id` if it is still at `expected`.
    async fn update(&self, id: RecordId, expected: VersionToken, fields: F)
        -> StoreResult<Record<F>>;

    /// Remove `id` if it is still at `expected`.
    async fn delete(&self, id: RecordId, expected: VersionToken) -> StoreResult<()>;
}

/// Run `op` on the blocking pool and wait for its outcome.
async fn run_blocking<T, Op>(op: Op) -> StoreResult<T>
where
    T: Send + 'static,
    Op: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op).await.map_err(|join_error| {
        tracing::warn!(error = %join_error, "async store task failed");
        StoreError::unavailable(format!("store task failed: {}", join_error))
    })?
}

#[async_trait]
impl<F, B> AsyncRecordStore<F> for Arc<VersionedRecordStore<F, B>>
where
    F: Serialize + DeserializeOwned + Send + 'static,
    B: StorageBackend + 'static,
{
    async fn create(&self, fields: F) -> StoreResult<Record<F>> {
        let store = Arc::clone(self);
        let timeout = store.op_timeout();
        run_blocking(move || store.with_timeout(timeout).create(fields)).await
    }

    async fn read(&self, id: RecordId) -> StoreResult<Record<F>> {
        let store = Arc::clone(self);
        let timeout = store.op_timeout();
        run_blocking(move || store.with_timeout(timeout).read(id)).await
    }

    async fn update(
        &self,
        id: RecordId,
        expected: VersionToken,
        fields: F,
    ) -> StoreResult<Record<F>> {
        let store = Arc::clone(self);
        let timeout = store.op_timeout();
        run_blocking(move || {
            store.with_timeout(timeout).update(id, expected, fields)
        })
        .await
    }

    async fn delete(&self, id: RecordId, expected: VersionToken) -> StoreResult<()> {
        let store = Arc::clone(self);
        let timeout = store.op_timeout();
        run_blocking(move || store.with_timeout(timeout).delete(id, expected)).await
    }
}
