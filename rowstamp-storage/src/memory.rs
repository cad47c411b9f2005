//! In-memory storage backend.
//!
//! Records live in a `HashMap` behind a `parking_lot::RwLock`. A transaction
//! holds the write lock for its whole duration and stages its writes in an
//! overlay, which is applied to the map only after the block succeeds.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use rowstamp_core::{RecordId, StoreError, StoreResult};

use crate::backend::{KvRead, KvWrite, StorageBackend};

/// In-memory backend for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<RecordId, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

/// Read view over the committed map.
struct Snapshot<'a> {
    records: &'a HashMap<RecordId, Vec<u8>>,
}

impl KvRead for Snapshot<'_> {
    fn get(&self, id: &RecordId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.get(id).cloned())
    }
}

/// Pending writes layered over the committed map. `None` marks a removal.
struct Staged<'a> {
    base: &'a HashMap<RecordId, Vec<u8>>,
    pending: HashMap<RecordId, Option<Vec<u8>>>,
}

impl KvRead for Staged<'_> {
    fn get(&self, id: &RecordId) -> StoreResult<Option<Vec<u8>>> {
        match self.pending.get(id) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.base.get(id).cloned()),
        }
    }
}

impl KvWrite for Staged<'_> {
    fn put(&mut self, id: &RecordId, bytes: Vec<u8>) -> StoreResult<()> {
        self.pending.insert(*id, Some(bytes));
        Ok(())
    }

    fn remove(&mut self, id: &RecordId) -> StoreResult<bool> {
        let existed = self.get(id)?.is_some();
        self.pending.insert(*id, None);
        Ok(existed)
    }
}

fn lock_timeout(kind: &str, timeout: Duration) -> StoreError {
    StoreError::unavailable(format!(
        "timed out after {:?} waiting for in-memory {} lock",
        timeout, kind
    ))
}

impl StorageBackend for InMemoryBackend {
    fn read_view<R, F>(&self, timeout: Duration, f: F) -> StoreResult<R>
    where
        F: FnOnce(&dyn KvRead) -> StoreResult<R>,
    {
        let guard = self
            .records
            .try_read_for(timeout)
            .ok_or_else(|| lock_timeout("read", timeout))?;
        f(&Snapshot { records: &*guard })
    }

    fn transactionally<R, F>(&self, timeout: Duration, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut dyn KvWrite) -> StoreResult<R>,
    {
        let mut guard = self
            .records
            .try_write_for(timeout)
            .ok_or_else(|| lock_timeout("write", timeout))?;

        let mut staged = Staged {
            base: &*guard,
            pending: HashMap::new(),
        };
        // On error the overlay is dropped and the map is untouched.
        let result = f(&mut staged)?;
        let pending = staged.pending;

        for (id, value) in pending {
            match value {
                Some(bytes) => {
                    guard.insert(id, bytes);
                }
                None => {
                    guard.remove(&id);
                }
            }
        }

        Ok(result)
    }

    fn len(&self, timeout: Duration) -> StoreResult<usize> {
        let guard = self
            .records
            .try_read_for(timeout)
            .ok_or_else(|| lock_timeout("read", timeout))?;
        Ok(guard.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
