//! Identity types for versioned records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Number of bytes in a version token.
pub const VERSION_TOKEN_LEN: usize = 16;

// ============================================================================
// RECORD ID
// ============================================================================

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
///
/// Assigned once by the store at creation time and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a new timestamp-sortable record ID.
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// The 16 raw bytes, used as the storage key.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// VERSION TOKEN
// ============================================================================

/// Error when a version token cannot be parsed or constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("Invalid version token hex: {0}")]
    InvalidHex(String),

    #[error("Invalid version token length: expected 16 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Version token must not be empty")]
    Empty,
}

/// Opaque concurrency stamp identifying one state of a record.
///
/// A fresh 128-bit random value is drawn on create and on every accepted
/// write. The all-zero value is reserved as "empty" and is never issued.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken([u8; VERSION_TOKEN_LEN]);

impl VersionToken {
    /// Draw a new random token.
    pub fn generate() -> Self {
        loop {
            let bytes = Uuid::new_v4().into_bytes();
            if bytes != [0u8; VERSION_TOKEN_LEN] {
                return Self(bytes);
            }
        }
    }

    /// Draw a new token guaranteed to differ from `self`.
    pub fn rotate(&self) -> Self {
        loop {
            let next = Self::generate();
            if next != *self {
                return next;
            }
        }
    }

    /// Build a token from raw bytes. Rejects the all-zero value.
    pub fn from_bytes(bytes: [u8; VERSION_TOKEN_LEN]) -> Result<Self, TokenParseError> {
        if bytes == [0u8; VERSION_TOKEN_LEN] {
            return Err(TokenParseError::Empty);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; VERSION_TOKEN_LEN] {
        &self.0
    }

    /// Lowercase hex rendering (32 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({})", self.to_hex())
    }
}

impl FromStr for VersionToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TokenParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; VERSION_TOKEN_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TokenParseError::InvalidLength(bytes.len()))?;
        Self::from_bytes(bytes)
    }
}

impl TryFrom<String> for VersionToken {
    type Error = TokenParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VersionToken> for String {
    fn from(token: VersionToken) -> Self {
        token.to_hex()
    }
}

// =============================================================================
// TESTS
// =============================================================================
