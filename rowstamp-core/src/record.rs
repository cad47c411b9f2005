//! Versioned record and write-intent types

use crate::{RecordId, Timestamp, VersionToken};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One persisted state of an entity.
///
/// `fields` is opaque to the store. `version` identifies this exact state;
/// any accepted write produces a successor with a different version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<F> {
    pub id: RecordId,
    pub version: VersionToken,
    pub fields: F,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl<F> Record<F> {
    /// Build the first state of a new record with a fresh id and version.
    pub fn new(fields: F) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::now_v7(),
            version: VersionToken::generate(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the successor state carrying `fields` and a rotated version.
    pub fn revise(self, fields: F) -> Self {
        Self {
            id: self.id,
            version: self.version.rotate(),
            fields,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }

    /// Capture a write intent against the version this record was read at.
    pub fn to_update(&self, fields: F) -> RecordUpdate<F> {
        RecordUpdate {
            id: self.id,
            expected_version: self.version,
            fields,
        }
    }
}

/// A conditional write: replace `fields` only if the record is still at
/// `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate<F> {
    pub id: RecordId,
    pub expected_version: VersionToken,
    pub fields: F,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_version_and_matching_timestamps() {
        let record = Record::new("First".to_string());
        assert_ne!(record.version.as_bytes(), &[0u8; 16]);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_revise_keeps_identity_and_rotates_version() {
        let record = Record::new("First".to_string());
        let (id, version, created_at) = (record.id, record.version, record.created_at);

        let next = record.revise("Second".to_string());
        assert_eq!(next.id, id);
        assert_eq!(next.created_at, created_at);
        assert_ne!(next.version, version);
        assert_eq!(next.fields, "Second");
        assert!(next.updated_at >= created_at);
    }

    #[test]
    fn test_to_update_captures_read_version() {
        let record = Record::new(1u32);
        let update = record.to_update(2);
        assert_eq!(update.id, record.id);
        assert_eq!(update.expected_version, record.version);
        assert_eq!(update.fields, 2);
    }

    #[test]
    fn test_record_json_carries_hex_version() {
        let record = Record::new(vec![1u8, 2, 3]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["version"], serde_json::json!(record.version.to_hex()));

        let back: Record<Vec<u8>> = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
