//! labelpool Storage - Store Traits and Backends
//!
//! Defines the point, list, document, and query-record stores the serving
//! core reads and writes, plus the failure-tolerant helpers every write
//! goes through. Two backends: in-memory and LMDB.

pub mod context;
pub mod lmdb;
pub mod memory;
pub mod safe;
pub mod store_key;
pub mod traits;
pub mod unlabelled;

pub use context::StorageContext;
pub use lmdb::{LmdbStorage, LmdbStorageError, StoreStats};
pub use memory::MemoryStorage;
pub use safe::{safe_push, safe_read, safe_write, write_outcome, WriteOutcome};
pub use store_key::{KeyKind, StoreKey};
pub use traits::{DocumentStore, ListStore, PointStore, QueryStore, StorageBackend};
pub use unlabelled::UnlabelledPool;
