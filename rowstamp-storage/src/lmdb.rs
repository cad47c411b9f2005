//! LMDB-backed durable storage.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! crash-safe key-value store. Records are keyed by the 16 raw bytes of
//! their [`RecordId`].
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions with a single writer at a time:
//! - Read transactions back [`StorageBackend::read_view`]
//! - Write transactions back [`StorageBackend::transactionally`]; the
//!   transaction commits only when the block returns `Ok` and is aborted
//!   (dropped) otherwise
//!
//! LMDB itself waits indefinitely for the writer slot, so writers first
//! pass a gate with a timed acquire. The gate is shared by every backend
//! this process opens on the same directory. It does not extend across
//! processes: a writer in another process holding the LMDB writer slot can
//! still stall a local writer inside LMDB.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rowstamp_core::{RecordId, RowstampResult, StoreConfig, StoreError, StoreResult};

use crate::backend::{KvRead, KvWrite, StorageBackend};

/// Durable backend over a single unnamed LMDB database.
pub struct LmdbBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    writer_gate: Arc<Mutex<()>>,
}

/// Writer gates of open environments, keyed by canonical directory.
static WRITER_GATES: Lazy<Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The gate shared by all backends open on `dir`.
fn writer_gate_for(dir: &Path) -> Arc<Mutex<()>> {
    let mut gates = WRITER_GATES.lock();
    gates.retain(|_, gate| gate.strong_count() > 0);
    if let Some(gate) = gates.get(dir).and_then(Weak::upgrade) {
        return gate;
    }
    let gate = Arc::new(Mutex::new(()));
    gates.insert(dir.to_path_buf(), Arc::downgrade(&gate));
    gate
}

fn lmdb_error(context: &str, e: heed::Error) -> StoreError {
    StoreError::unavailable(format!("LMDB {}: {}", context, e))
}

impl LmdbBackend {
    /// Open (or create) the backend in the configured `data_dir`.
    pub fn open(config: &StoreConfig) -> RowstampResult<Self> {
        config.validate()?;
        let path = config.require_data_dir()?;
        Ok(Self::open_at(path, config.map_size_mb)?)
    }

    /// Open (or create) the backend at `path` with a map of `map_size_mb`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if:
    /// - `map_size_mb` does not fit in bytes on this platform
    /// - The directory cannot be created
    /// - The LMDB environment cannot be opened
    /// - The database cannot be created
    pub fn open_at<P: AsRef<Path>>(path: P, map_size_mb: usize) -> StoreResult<Self> {
        let map_size = map_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            StoreError::unavailable(format!("LMDB map size of {} MB overflows", map_size_mb))
        })?;

        std::fs::create_dir_all(&path).map_err(|e| {
            StoreError::unavailable(format!(
                "cannot create data dir {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let dir = path.as_ref().canonicalize().map_err(|e| {
            StoreError::unavailable(format!(
                "cannot resolve data dir {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        // SAFETY: heed hands back the already open environment for a
        // directory this process has opened, and the map is never accessed
        // outside heed's API.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(&dir)
        }
        .map_err(|e| lmdb_error("open environment", e))?;

        let writer_gate = writer_gate_for(&dir);

        // The unnamed database always exists, so opening it needs no writer
        // slot and cannot stall behind another backend's transaction.
        let rtxn = env.read_txn().map_err(|e| lmdb_error("begin read", e))?;
        let existing: Option<Database<Bytes, Bytes>> = env
            .open_database(&rtxn, None)
            .map_err(|e| lmdb_error("open database", e))?;
        rtxn.commit().map_err(|e| lmdb_error("commit", e))?;

        let db = match existing {
            Some(db) => db,
            None => {
                let _gate = writer_gate.lock();
                let mut wtxn = env
                    .write_txn()
                    .map_err(|e| lmdb_error("begin write", e))?;
                let db = env
                    .create_database(&mut wtxn, None)
                    .map_err(|e| lmdb_error("create database", e))?;
                wtxn.commit().map_err(|e| lmdb_error("commit", e))?;
                db
            }
        };

        tracing::debug!(path = %dir.display(), map_size_mb, "opened LMDB backend");

        Ok(Self {
            env,
            db,
            writer_gate,
        })
    }

    /// Flush the environment to disk.
    pub fn sync(&self) -> StoreResult<()> {
        self.env
            .force_sync()
            .map_err(|e| lmdb_error("force sync", e))
    }
}

impl std::fmt::Debug for LmdbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbBackend")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

struct ReadView<'t, 'e> {
    db: Database<Bytes, Bytes>,
    txn: &'t RoTxn<'e>,
}

impl KvRead for ReadView<'_, '_> {
    fn get(&self, id: &RecordId) -> StoreResult<Option<Vec<u8>>> {
        self.db
            .get(self.txn, &id.as_bytes()[..])
            .map(|value| value.map(<[u8]>::to_vec))
            .map_err(|e| lmdb_error("get", e))
    }
}

struct WriteView<'e> {
    db: Database<Bytes, Bytes>,
    txn: RwTxn<'e>,
}

impl KvRead for WriteView<'_> {
    fn get(&self, id: &RecordId) -> StoreResult<Option<Vec<u8>>> {
        self.db
            .get(&self.txn, &id.as_bytes()[..])
            .map(|value| value.map(<[u8]>::to_vec))
            .map_err(|e| lmdb_error("get", e))
    }
}

impl KvWrite for WriteView<'_> {
    fn put(&mut self, id: &RecordId, bytes: Vec<u8>) -> StoreResult<()> {
        self.db
            .put(&mut self.txn, &id.as_bytes()[..], &bytes)
            .map_err(|e| lmdb_error("put", e))
    }

    fn remove(&mut self, id: &RecordId) -> StoreResult<bool> {
        self.db
            .delete(&mut self.txn, &id.as_bytes()[..])
            .map_err(|e| lmdb_error("delete", e))
    }
}

impl StorageBackend for LmdbBackend {
    fn read_view<R, F>(&self, _timeout: Duration, f: F) -> StoreResult<R>
    where
        F: FnOnce(&dyn KvRead) -> StoreResult<R>,
    {
        // LMDB readers never wait on writers.
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| lmdb_error("begin read", e))?;
        f(&ReadView {
            db: self.db,
            txn: &rtxn,
        })
    }

    fn transactionally<R, F>(&self, timeout: Duration, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut dyn KvWrite) -> StoreResult<R>,
    {
        let _gate = self.writer_gate.try_lock_for(timeout).ok_or_else(|| {
            StoreError::unavailable(format!(
                "timed out after {:?} waiting for LMDB writer",
                timeout
            ))
        })?;

        let txn = self
            .env
            .write_txn()
            .map_err(|e| lmdb_error("begin write", e))?;
        let mut view = WriteView { db: self.db, txn };

        // Dropping an uncommitted RwTxn aborts it.
        let result = f(&mut view)?;
        view.txn.commit().map_err(|e| lmdb_error("commit", e))?;
        Ok(result)
    }

    fn len(&self, _timeout: Duration) -> StoreResult<usize> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| lmdb_error("begin read", e))?;
        let count = self.db.len(&rtxn).map_err(|e| lmdb_error("len", e))?;
        Ok(count as usize)
    }

    fn name(&self) -> &'static str {
        "lmdb"
    }
}
