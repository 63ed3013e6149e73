//! In-memory backend.
//!
//! Every store is a map behind its own lock, so each operation is atomic
//! with respect to the key (or list) it touches.

use crate::traits::{DocumentStore, ListStore, PointStore, QueryStore};
use labelpool_core::{LabelPoolError, LabelPoolResult, QueryRecord, StorageError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory implementation of every store, for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    points: RwLock<HashMap<String, Vec<u8>>>,
    /// Items in push order; the head is the last element.
    lists: RwLock<HashMap<String, Vec<Vec<u8>>>>,
    docs: RwLock<HashMap<String, HashMap<String, Value>>>,
    queries: RwLock<HashMap<Uuid, QueryRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> LabelPoolError {
    LabelPoolError::Storage(StorageError::LockPoisoned)
}

impl PointStore for MemoryStorage {
    fn set(&self, key: &str, blob: Vec<u8>) -> LabelPoolResult<()> {
        let mut points = self.points.write().map_err(|_| poisoned())?;
        points.insert(key.to_string(), blob);
        Ok(())
    }

    fn get(&self, key: &str) -> LabelPoolResult<Option<Vec<u8>>> {
        let points = self.points.read().map_err(|_| poisoned())?;
        Ok(points.get(key).cloned())
    }
}

impl ListStore for MemoryStorage {
    fn push_head(&self, list: &str, blob: Vec<u8>) -> LabelPoolResult<u64> {
        let mut lists = self.lists.write().map_err(|_| poisoned())?;
        let items = lists.entry(list.to_string()).or_default();
        items.push(blob);
        Ok(items.len() as u64)
    }

    fn list_len(&self, list: &str) -> LabelPoolResult<u64> {
        let lists = self.lists.read().map_err(|_| poisoned())?;
        Ok(lists.get(list).map(|items| items.len() as u64).unwrap_or(0))
    }

    fn index_from_head(&self, list: &str, position: u64) -> LabelPoolResult<Option<Vec<u8>>> {
        let lists = self.lists.read().map_err(|_| poisoned())?;
        let Some(items) = lists.get(list) else {
            return Ok(None);
        };
        let len = items.len() as u64;
        if position >= len {
            return Ok(None);
        }
        Ok(items.get((len - position - 1) as usize).cloned())
    }

    fn index_from_tail(&self, list: &str, offset: u64) -> LabelPoolResult<Option<Vec<u8>>> {
        let lists = self.lists.read().map_err(|_| poisoned())?;
        Ok(lists
            .get(list)
            .and_then(|items| usize::try_from(offset).ok().and_then(|i| items.get(i)))
            .cloned())
    }
}

impl DocumentStore for MemoryStorage {
    fn doc_get(&self, name: &str, key: &str) -> LabelPoolResult<Option<Value>> {
        let docs = self.docs.read().map_err(|_| poisoned())?;
        Ok(docs.get(name).and_then(|doc| doc.get(key)).cloned())
    }

    fn doc_set(&self, name: &str, key: &str, value: Value) -> LabelPoolResult<()> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn doc_increment(&self, name: &str, key: &str) -> LabelPoolResult<i64> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        let entry = docs
            .entry(name.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert(Value::from(0));
        let current = entry.as_i64().ok_or_else(|| {
            LabelPoolError::Storage(StorageError::WriteFailed {
                key: format!("{}/{}", name, key),
                reason: format!("cannot increment non-integer value {}", entry),
            })
        })?;
        let next = current + 1;
        *entry = Value::from(next);
        Ok(next)
    }
}

impl QueryStore for MemoryStorage {
    fn query_put(&self, record: &QueryRecord) -> LabelPoolResult<()> {
        let mut queries = self.queries.write().map_err(|_| poisoned())?;
        queries.insert(record.query_uid, record.clone());
        Ok(())
    }

    fn query_get(&self, query_uid: Uuid) -> LabelPoolResult<Option<QueryRecord>> {
        let queries = self.queries.read().map_err(|_| poisoned())?;
        Ok(queries.get(&query_uid).cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// After pushing r0..r(k-1), head position k-1-p holds r(p), and tail
        /// offset p keeps resolving to r(p) after further pushes.
        #[test]
        fn prop_tail_addressing_is_stable(
            first in prop::collection::vec(any::<u8>(), 1..20),
            more in prop::collection::vec(any::<u8>(), 0..20),
        ) {
            let storage = MemoryStorage::new();
            for b in &first {
                storage.push_head("data", vec![*b]).unwrap();
            }
            let k = first.len() as u64;
            for p in 0..k {
                let head = storage.index_from_head("data", k - p - 1).unwrap();
                prop_assert_eq!(head, Some(vec![first[p as usize]]));
            }

            for b in &more {
                storage.push_head("data", vec![*b]).unwrap();
            }
            for p in 0..k {
                let item = storage.index_from_tail("data", p).unwrap();
                prop_assert_eq!(item, Some(vec![first[p as usize]]));
            }
        }
    }
}
