//! LMDB-backed storage.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a durable,
//! memory-mapped implementation of every store in one environment.
//!
//! # Layout
//!
//! Four named databases:
//! - `points`: raw key bytes → blob
//! - `lists`: [`StoreKey`] list lengths and list items
//! - `docs`: [`StoreKey`] document entries → JSON
//! - `queries`: query UUID bytes → JSON query record
//!
//! # Atomicity
//!
//! Each operation runs in a single LMDB transaction. LMDB serialises
//! writers, so `push_head` and `doc_increment` are linearizable, and a
//! tail-indexed read sees the length and the item from one snapshot.

use std::path::Path;
use std::sync::RwLock;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use labelpool_core::{LabelPoolError, LabelPoolResult, QueryRecord, StorageError};
use serde_json::Value;
use uuid::Uuid;

use crate::store_key::StoreKey;
use crate::traits::{DocumentStore, ListStore, PointStore, QueryStore};

/// Error type for LMDB storage operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStorageError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a database within the environment.
    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: String, reason: String },

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStorageError> for LabelPoolError {
    fn from(e: LmdbStorageError) -> Self {
        LabelPoolError::Storage(StorageError::TransactionFailed {
            reason: e.to_string(),
        })
    }
}

fn txn_err(e: heed::Error) -> LmdbStorageError {
    LmdbStorageError::Transaction(e.to_string())
}

/// Point-store usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LMDB-backed implementation of every store.
///
/// # Example
///
/// ```ignore
/// use labelpool_storage::{LmdbStorage, StorageContext};
/// use std::sync::Arc;
///
/// let backend = Arc::new(LmdbStorage::open("/var/lib/labelpool", 1024)?);
/// let ctx = StorageContext::from_backend(backend);
/// ```
pub struct LmdbStorage {
    env: Env,
    points: Database<Bytes, Bytes>,
    lists: Database<Bytes, Bytes>,
    docs: Database<Bytes, Bytes>,
    queries: Database<Bytes, Bytes>,
    stats: RwLock<StoreStats>,
}

impl LmdbStorage {
    /// Open (or create) an LMDB environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStorageError> {
        let map_size = max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbStorageError::EnvOpen(format!("map size of {} MB overflows", max_size_mb))
        })?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(4)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStorageError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let mut create = |name: &str| -> Result<Database<Bytes, Bytes>, LmdbStorageError> {
            env.create_database(&mut wtxn, Some(name))
                .map_err(|e| LmdbStorageError::DbOpen {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
        };
        let points = create("points")?;
        let lists = create("lists")?;
        let docs = create("docs")?;
        let queries = create("queries")?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            points,
            lists,
            docs,
            queries,
            stats: RwLock::new(StoreStats::default()),
        })
    }

    /// Snapshot of point-store usage counters.
    pub fn stats(&self) -> StoreStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut StoreStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    fn read_len(&self, txn: &heed::RoTxn, list: &str) -> Result<u64, LmdbStorageError> {
        let key = StoreKey::list_len(list).encode();
        match self.lists.get(txn, &key).map_err(txn_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbStorageError::Deserialization(format!("bad length entry for list {}", list))
                })?;
                Ok(u64::from_le_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn read_item(
        &self,
        txn: &heed::RoTxn,
        list: &str,
        seq: u64,
    ) -> Result<Option<Vec<u8>>, LmdbStorageError> {
        let key = StoreKey::list_item(list, seq).encode();
        Ok(self
            .lists
            .get(txn, &key)
            .map_err(txn_err)?
            .map(|bytes| bytes.to_vec()))
    }
}

impl PointStore for LmdbStorage {
    fn set(&self, key: &str, blob: Vec<u8>) -> LabelPoolResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.points
            .put(&mut wtxn, key.as_bytes(), &blob)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        self.record(|s| s.writes += 1);
        Ok(())
    }

    fn get(&self, key: &str) -> LabelPoolResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let found = self
            .points
            .get(&rtxn, key.as_bytes())
            .map_err(txn_err)?
            .map(|bytes| bytes.to_vec());
        match found {
            Some(_) => self.record(|s| s.hits += 1),
            None => self.record(|s| s.misses += 1),
        }
        Ok(found)
    }
}

impl ListStore for LmdbStorage {
    fn push_head(&self, list: &str, blob: Vec<u8>) -> LabelPoolResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let seq = self.read_len(&wtxn, list)?;
        let item_key = StoreKey::list_item(list, seq).encode();
        self.lists
            .put(&mut wtxn, &item_key, &blob)
            .map_err(txn_err)?;
        let new_len = seq + 1;
        let len_key = StoreKey::list_len(list).encode();
        self.lists
            .put(&mut wtxn, &len_key, &new_len.to_le_bytes())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(new_len)
    }

    fn list_len(&self, list: &str) -> LabelPoolResult<u64> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        Ok(self.read_len(&rtxn, list)?)
    }

    fn index_from_head(&self, list: &str, position: u64) -> LabelPoolResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let len = self.read_len(&rtxn, list)?;
        if position >= len {
            return Ok(None);
        }
        Ok(self.read_item(&rtxn, list, len - position - 1)?)
    }

    fn index_from_tail(&self, list: &str, offset: u64) -> LabelPoolResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let len = self.read_len(&rtxn, list)?;
        if offset >= len {
            return Ok(None);
        }
        // head position len - offset - 1 holds the item pushed at seq `offset`
        Ok(self.read_item(&rtxn, list, offset)?)
    }
}

impl DocumentStore for LmdbStorage {
    fn doc_get(&self, name: &str, key: &str) -> LabelPoolResult<Option<Value>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let encoded = StoreKey::doc_entry(name, key).encode();
        match self.docs.get(&rtxn, &encoded).map_err(txn_err)? {
            Some(bytes) => {
                let value = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbStorageError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn doc_set(&self, name: &str, key: &str, value: Value) -> LabelPoolResult<()> {
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| LmdbStorageError::Serialization(e.to_string()))?;
        let encoded = StoreKey::doc_entry(name, key).encode();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.docs
            .put(&mut wtxn, &encoded, &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn doc_increment(&self, name: &str, key: &str) -> LabelPoolResult<i64> {
        let encoded = StoreKey::doc_entry(name, key).encode();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        let current = match self.docs.get(&wtxn, &encoded).map_err(txn_err)? {
            Some(bytes) => {
                let value: Value = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbStorageError::Deserialization(e.to_string()))?;
                value.as_i64().ok_or_else(|| {
                    LabelPoolError::Storage(StorageError::WriteFailed {
                        key: format!("{}/{}", name, key),
                        reason: format!("cannot increment non-integer value {}", value),
                    })
                })?
            }
            None => 0,
        };

        let next = current + 1;
        let bytes = serde_json::to_vec(&Value::from(next))
            .map_err(|e| LmdbStorageError::Serialization(e.to_string()))?;
        self.docs
            .put(&mut wtxn, &encoded, &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(next)
    }
}

impl QueryStore for LmdbStorage {
    fn query_put(&self, record: &QueryRecord) -> LabelPoolResult<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| LmdbStorageError::Serialization(e.to_string()))?;
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.queries
            .put(&mut wtxn, record.query_uid.as_bytes(), &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn query_get(&self, query_uid: Uuid) -> LabelPoolResult<Option<QueryRecord>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        match self
            .queries
            .get(&rtxn, query_uid.as_bytes())
            .map_err(txn_err)?
        {
            Some(bytes) => {
                let record = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbStorageError::Deserialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_backend() -> (LmdbStorage, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend =
            LmdbStorage::open(temp_dir.path(), 10).expect("backend creation should succeed");
        (backend, temp_dir)
    }

    #[test]
    fn test_open_rejects_overflowing_map_size() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let result = LmdbStorage::open(temp_dir.path(), usize::MAX / 2);
        assert!(matches!(result, Err(LmdbStorageError::EnvOpen(_))));
    }

    #[test]
    fn test_point_set_get() {
        let (backend, _dir) = create_test_backend();
        assert!(backend.get("42").unwrap().is_none());

        backend.set("42", b"row".to_vec()).unwrap();
        assert_eq!(backend.get("42").unwrap(), Some(b"row".to_vec()));

        let stats = backend.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_list_addressing() {
        let (backend, _dir) = create_test_backend();
        for item in [b"r0", b"r1", b"r2"] {
            backend.push_head("data", item.to_vec()).unwrap();
        }

        assert_eq!(backend.list_len("data").unwrap(), 3);
        assert_eq!(
            backend.index_from_head("data", 0).unwrap(),
            Some(b"r2".to_vec())
        );
        assert_eq!(
            backend.index_from_tail("data", 0).unwrap(),
            Some(b"r0".to_vec())
        );
        assert!(backend.index_from_tail("data", 3).unwrap().is_none());

        backend.push_head("data", b"r3".to_vec()).unwrap();
        assert_eq!(
            backend.index_from_tail("data", 1).unwrap(),
            Some(b"r1".to_vec())
        );
        assert_eq!(
            backend.index_from_head("data", 0).unwrap(),
            Some(b"r3".to_vec())
        );
    }

    #[test]
    fn test_lists_are_independent() {
        let (backend, _dir) = create_test_backend();
        backend.push_head("a", b"x".to_vec()).unwrap();
        assert_eq!(backend.list_len("a").unwrap(), 1);
        assert_eq!(backend.list_len("b").unwrap(), 0);
        assert!(backend.index_from_tail("b", 0).unwrap().is_none());
    }

    #[test]
    fn test_doc_set_get_increment() {
        let (backend, _dir) = create_test_backend();
        backend.doc_set("experiment", "unlabelled_len", json!(3)).unwrap();
        assert_eq!(
            backend.doc_get("experiment", "unlabelled_len").unwrap(),
            Some(json!(3))
        );

        assert_eq!(backend.doc_increment("experiment", "answers").unwrap(), 1);
        assert_eq!(backend.doc_increment("experiment", "answers").unwrap(), 2);
        assert!(backend.doc_get("other", "answers").unwrap().is_none());
    }

    #[test]
    fn test_increment_rejects_non_integer() {
        let (backend, _dir) = create_test_backend();
        backend.doc_set("experiment", "answers", json!([1])).unwrap();
        assert!(backend.doc_increment("experiment", "answers").is_err());
        assert_eq!(
            backend.doc_get("experiment", "answers").unwrap(),
            Some(json!([1]))
        );
    }

    #[test]
    fn test_query_put_get() {
        let (backend, _dir) = create_test_backend();
        let record = QueryRecord {
            query_uid: Uuid::now_v7(),
            target_index: 42,
            alg_label: "test".to_string(),
            participant_uid: "p1".to_string(),
            issued_at: Utc::now(),
        };
        backend.query_put(&record).unwrap();
        assert_eq!(backend.query_get(record.query_uid).unwrap(), Some(record));
        assert!(backend.query_get(Uuid::now_v7()).unwrap().is_none());
    }

    #[test]
    fn test_reopen_preserves_data() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend = LmdbStorage::open(temp_dir.path(), 10).unwrap();
            backend.set("k", b"v".to_vec()).unwrap();
            backend.push_head("data", b"r0".to_vec()).unwrap();
            backend.doc_increment("experiment", "n").unwrap();
        }
        let backend = LmdbStorage::open(temp_dir.path(), 10).unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(
            backend.index_from_tail("data", 0).unwrap(),
            Some(b"r0".to_vec())
        );
        assert_eq!(backend.doc_get("experiment", "n").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_concurrent_increments_are_linearizable() {
        let (backend, _dir) = create_test_backend();
        let backend = Arc::new(backend);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = Arc::clone(&backend);
                std::thread::spawn(move || backend.doc_increment("experiment", "n").unwrap())
            })
            .collect();

        let mut seen: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=8).collect::<Vec<i64>>());
    }
}
