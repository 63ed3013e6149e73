//! Store traits.
//!
//! Three access patterns over external stores plus the host's query
//! record lookup. Every method is atomic on its own; nothing here spans
//! more than one key or list in a single operation.

use labelpool_core::{LabelPoolResult, QueryRecord};
use serde_json::Value;
use uuid::Uuid;

/// Point-access key → blob store. Last write wins.
pub trait PointStore: Send + Sync {
    /// Store a blob under a key.
    fn set(&self, key: &str, blob: Vec<u8>) -> LabelPoolResult<()>;

    /// Get the blob stored under a key, or None if absent.
    fn get(&self, key: &str) -> LabelPoolResult<Option<Vec<u8>>>;
}

/// Append-only ordered list store.
///
/// Items are pushed onto the head. Head-relative position 0 is the most
/// recent push; tail-relative offset 0 is the first push ever made, and
/// stays so no matter how many pushes follow.
pub trait ListStore: Send + Sync {
    /// Push a blob onto the head of a list, returning the new length.
    fn push_head(&self, list: &str, blob: Vec<u8>) -> LabelPoolResult<u64>;

    /// Current length of a list (0 for a list never pushed to).
    fn list_len(&self, list: &str) -> LabelPoolResult<u64>;

    /// Read by head-relative position.
    fn index_from_head(&self, list: &str, position: u64) -> LabelPoolResult<Option<Vec<u8>>>;

    /// Read by tail-relative offset.
    ///
    /// Offset `p` resolves to head position `len - p - 1` where `len` is the
    /// length at the moment of the read. Implementations must read the
    /// length and the item atomically.
    fn index_from_tail(&self, list: &str, offset: u64) -> LabelPoolResult<Option<Vec<u8>>>;
}

/// Named key–value documents (counters, algorithm artifacts).
pub trait DocumentStore: Send + Sync {
    fn doc_get(&self, name: &str, key: &str) -> LabelPoolResult<Option<Value>>;

    fn doc_set(&self, name: &str, key: &str, value: Value) -> LabelPoolResult<()>;

    /// Atomically increment an integer entry and return the new value.
    ///
    /// A missing entry counts as 0. Concurrent callers never observe the
    /// same pre-increment value.
    fn doc_increment(&self, name: &str, key: &str) -> LabelPoolResult<i64>;
}

/// Records of queries issued by the host runtime.
pub trait QueryStore: Send + Sync {
    fn query_put(&self, record: &QueryRecord) -> LabelPoolResult<()>;

    fn query_get(&self, query_uid: Uuid) -> LabelPoolResult<Option<QueryRecord>>;
}

/// A backend that provides every store.
pub trait StorageBackend: PointStore + ListStore + DocumentStore + QueryStore {}

impl<T: PointStore + ListStore + DocumentStore + QueryStore> StorageBackend for T {}
