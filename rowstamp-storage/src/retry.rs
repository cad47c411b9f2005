//! Caller-side conflict retry.
//!
//! The store reports every conflict and never retries on its own. Callers
//! that want read-modify-write semantics can use [`update_with_retry`],
//! which re-reads the record after each conflict and re-applies the
//! mutation to the fresh fields.
//!
//! The mutation closure may run once per attempt, so it must depend only on
//! the fields it is given.

use rowstamp_core::{Record, RecordId, RetryConfig, StoreResult};

use crate::store::RecordStore;

/// Read `id`, apply `mutate` to its fields and submit the result, retrying
/// on `ConcurrencyConflict` up to `retry.max_attempts` times.
///
/// `NotFound` and `StorageUnavailable` are returned immediately. When every
/// attempt conflicts, the last conflict is returned unchanged.
pub fn update_with_retry<F, S, M>(
    store: &S,
    id: RecordId,
    retry: &RetryConfig,
    mut mutate: M,
) -> StoreResult<Record<F>>
where
    S: RecordStore<F> + ?Sized,
    M: FnMut(&F) -> F,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let current = store.read(id)?;
        let fields = mutate(&current.fields);

        match store.update(id, current.version, fields) {
            Err(e) if e.is_conflict() && attempt < max_attempts => {
                let delay = retry.backoff_for(attempt);
                tracing::debug!(id = %id, attempt, ?delay, "retrying after version conflict");
                std::thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}
