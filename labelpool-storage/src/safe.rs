//! Failure-tolerant reads and writes.
//!
//! Every record written during partitioning and serving goes through
//! these helpers. A failed encode never reaches the store, so the value
//! previously stored at the key stays intact.

use crate::traits::{ListStore, PointStore};
use labelpool_core::codec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Per-write result, aggregated by the partitioner into its load report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    Failed { reason: String },
}

impl WriteOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, WriteOutcome::Stored)
    }
}

/// Encode `value` and store it under `key`, reporting the outcome.
pub fn write_outcome<T: Serialize + ?Sized>(
    store: &dyn PointStore,
    key: &str,
    value: &T,
) -> WriteOutcome {
    let blob = match codec::encode(value) {
        Ok(blob) => blob,
        Err(e) => {
            warn!(key, error = %e, "encode failed, value not stored");
            return WriteOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    match store.set(key, blob) {
        Ok(()) => WriteOutcome::Stored,
        Err(e) => {
            warn!(key, error = %e, "store write failed, value not stored");
            WriteOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Encode and store a value. `false` means the value was not durably
/// stored; the failure has already been logged.
pub fn safe_write<T: Serialize + ?Sized>(store: &dyn PointStore, key: &str, value: &T) -> bool {
    write_outcome(store, key, value).is_stored()
}

/// Fetch and decode a value. Absent keys, store errors and decode
/// errors all yield `None`; only the errors are logged.
pub fn safe_read<T: DeserializeOwned>(store: &dyn PointStore, key: &str) -> Option<T> {
    let blob = match store.get(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "store read failed");
            return None;
        }
    };

    match codec::decode(&blob) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "decode failed");
            None
        }
    }
}

/// Encode and push a value onto the head of `list`, returning the new
/// list length, or `None` after logging a failure.
pub fn safe_push<T: Serialize + ?Sized>(
    store: &dyn ListStore,
    list: &str,
    value: &T,
) -> Option<u64> {
    let blob = match codec::encode(value) {
        Ok(blob) => blob,
        Err(e) => {
            warn!(list, error = %e, "encode failed, item not pushed");
            return None;
        }
    };

    match store.push_head(list, blob) {
        Ok(len) => Some(len),
        Err(e) => {
            warn!(list, error = %e, "list push failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use labelpool_core::{LabelPoolResult, StorageError};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    /// Point store that rejects every write.
    struct RejectingStore(MemoryStorage);

    impl PointStore for RejectingStore {
        fn set(&self, key: &str, _blob: Vec<u8>) -> LabelPoolResult<()> {
            Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "rejected".to_string(),
            }
            .into())
        }

        fn get(&self, key: &str) -> LabelPoolResult<Option<Vec<u8>>> {
            self.0.get(key)
        }
    }

    #[test]
    fn test_write_then_read() {
        let store = MemoryStorage::new();
        assert!(safe_write(&store, "42", &json!({"index": 42})));
        let back: Option<Value> = safe_read(&store, "42");
        assert_eq!(back, Some(json!({"index": 42})));
    }

    #[test]
    fn test_encode_failure_leaves_previous_value() {
        let store = MemoryStorage::new();
        assert!(safe_write(&store, "k", &json!("previous")));

        // JSON cannot encode non-string map keys
        let mut unencodable = BTreeMap::new();
        unencodable.insert(vec![1u8, 2], 3);
        let outcome = write_outcome(&store, "k", &unencodable);

        assert!(matches!(outcome, WriteOutcome::Failed { .. }));
        assert_eq!(safe_read::<Value>(&store, "k"), Some(json!("previous")));
    }

    #[test]
    fn test_store_failure_leaves_previous_value() {
        let inner = MemoryStorage::new();
        assert!(safe_write(&inner, "k", &json!("previous")));
        let store = RejectingStore(inner);

        assert!(!safe_write(&store, "k", &json!("next")));
        assert_eq!(safe_read::<Value>(&store, "k"), Some(json!("previous")));
    }

    #[test]
    fn test_read_of_garbage_is_none() {
        let store = MemoryStorage::new();
        store.set("k", vec![0x00, 0x01]).unwrap();
        assert_eq!(safe_read::<Value>(&store, "k"), None);
        assert_eq!(safe_read::<Value>(&store, "missing"), None);
    }

    #[test]
    fn test_push_returns_length() {
        let store = MemoryStorage::new();
        assert_eq!(safe_push(&store, "data", &json!({"index": 1})), Some(1));
        assert_eq!(safe_push(&store, "data", &json!({"index": 2})), Some(2));
    }
}
