//! Record encoding for byte-oriented backends.
//!
//! Format: the whole `Record<F>` as JSON. The version token is stored as a
//! 32-character hex string next to the fields it guards.

use rowstamp_core::{Record, RecordId, StoreError, StoreResult};
use serde::{de::DeserializeOwned, Serialize};

pub(crate) fn encode<F: Serialize>(record: &Record<F>) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| {
        StoreError::unavailable(format!("cannot encode record {}: {}", record.id, e))
    })
}

pub(crate) fn decode<F: DeserializeOwned>(id: &RecordId, bytes: &[u8]) -> StoreResult<Record<F>> {
    let record: Record<F> = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::unavailable(format!("corrupt record {}: {}", id, e)))?;
    if record.id != *id {
        return Err(StoreError::unavailable(format!(
            "record stored under {} claims id {}",
            id, record.id
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let id = RecordId::now_v7();
        let result = decode::<String>(&id, b"not json");
        assert!(matches!(result, Err(StoreError::StorageUnavailable { .. })));
    }

    #[test]
    fn test_decode_rejects_mismatched_key() {
        let record = Record::new("First".to_string());
        let bytes = encode(&record).unwrap();
        let other = RecordId::now_v7();
        assert!(decode::<String>(&other, &bytes).is_err());
        assert_eq!(decode::<String>(&record.id, &bytes).unwrap(), record);
    }
}
