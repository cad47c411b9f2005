//! Rowstamp Core - Record Types
//!
//! Pure data structures shared by every rowstamp crate: record identity,
//! version tokens, records, errors and configuration. No I/O lives here.

pub mod config;
pub mod error;
pub mod identity;
pub mod record;

pub use config::{
    RetryConfig, StoreConfig, DEFAULT_MAP_SIZE_MB, DEFAULT_OP_TIMEOUT_MS, MAX_MAP_SIZE_MB,
};
pub use error::{ConfigError, RowstampError, RowstampResult, StoreError, StoreResult};
pub use identity::{RecordId, Timestamp, TokenParseError, VersionToken, VERSION_TOKEN_LEN};
pub use record::{Record, RecordUpdate};

// ============================================================================
// PROPERTY TESTS
// ============================================================================
