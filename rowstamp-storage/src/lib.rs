//! Rowstamp Storage - Versioned Record Store
//!
//! Optimistic concurrency control over a pluggable storage backend. Every
//! record carries a version token; writes must present the version they
//! were based on and are rejected with `ConcurrencyConflict` when it is
//! stale.
//!
//! Backends:
//! - [`InMemoryBackend`] for tests and single-process use
//! - [`LmdbBackend`] for durable storage via LMDB

pub mod async_store;
pub mod backend;
mod codec;
pub mod lmdb;
pub mod memory;
pub mod retry;
pub mod store;

pub use async_store::AsyncRecordStore;
pub use backend::{KvRead, KvWrite, StorageBackend};
pub use lmdb::LmdbBackend;
pub use memory::InMemoryBackend;
pub use retry::update_with_retry;
pub use store::{RecordStore, TimedStore, VersionedRecordStore};

// Re-export core types so most callers need a single dependency.
pub use rowstamp_core::{
    Record, RecordId, RecordUpdate, RetryConfig, RowstampError, RowstampResult, StoreConfig,
    StoreError, StoreResult, VersionToken,
};
