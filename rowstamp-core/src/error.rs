//! Error types for rowstamp operations

use crate::{RecordId, VersionToken};
use thiserror::Error;

/// Errors surfaced by a versioned record store.
///
/// Every backend failure, including timeouts, lock poisoning and codec
/// failures, is reported as `StorageUnavailable`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {id}")]
    NotFound { id: RecordId },

    #[error("Concurrency conflict on record {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        id: RecordId,
        expected: VersionToken,
        actual: VersionToken,
    },

    #[error("Storage unavailable: {reason}")]
    StorageUnavailable { reason: String },
}

impl StoreError {
    /// Build a `StorageUnavailable` from any displayable cause.
    pub fn unavailable(reason: impl ToString) -> Self {
        StoreError::StorageUnavailable {
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }

    /// Whether the same request may succeed if resubmitted unchanged.
    ///
    /// Only transient backend failures qualify. A conflict needs a fresh read
    /// before resubmitting, and a missing record stays missing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all rowstamp errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowstampError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for rowstamp operations that may also fail on configuration.
pub type RowstampResult<T> = Result<T, RowstampError>;

// =============================================================================
// TESTS
// =============================================================================
