//! Storage context handed to every entry point.

use crate::lmdb::LmdbStorage;
use crate::memory::MemoryStorage;
use crate::traits::{DocumentStore, ListStore, PointStore, QueryStore, StorageBackend};
use labelpool_core::{LabelPoolResult, StorageConfig};
use std::sync::Arc;
use tracing::info;

/// Handles to the four stores.
///
/// Each store may be backed by a different system; the usual setup is
/// one backend providing all four via [`StorageContext::from_backend`].
#[derive(Clone)]
pub struct StorageContext {
    pub points: Arc<dyn PointStore>,
    pub lists: Arc<dyn ListStore>,
    pub docs: Arc<dyn DocumentStore>,
    pub queries: Arc<dyn QueryStore>,
}

impl StorageContext {
    pub fn new(
        points: Arc<dyn PointStore>,
        lists: Arc<dyn ListStore>,
        docs: Arc<dyn DocumentStore>,
        queries: Arc<dyn QueryStore>,
    ) -> Self {
        Self {
            points,
            lists,
            docs,
            queries,
        }
    }

    /// Use one backend for every store.
    pub fn from_backend<B: StorageBackend + 'static>(backend: Arc<B>) -> Self {
        Self {
            points: backend.clone(),
            lists: backend.clone(),
            docs: backend.clone(),
            queries: backend,
        }
    }

    /// Fresh in-memory context.
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStorage::new()))
    }

    /// Open the backend named by `config`: LMDB when a path is set,
    /// otherwise in-memory.
    pub fn from_config(config: &StorageConfig) -> LabelPoolResult<Self> {
        config.validate()?;
        match &config.lmdb_path {
            Some(path) => {
                info!(
                    path = %path.display(),
                    max_size_mb = config.max_size_mb,
                    "opening LMDB storage"
                );
                let backend = LmdbStorage::open(path, config.max_size_mb)?;
                Ok(Self::from_backend(Arc::new(backend)))
            }
            None => {
                info!("using in-memory storage");
                Ok(Self::in_memory())
            }
        }
    }

    /// Replace the point store, keeping the others.
    pub fn with_points(mut self, points: Arc<dyn PointStore>) -> Self {
        self.points = points;
        self
    }
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_from_backend_shares_state() {
        let ctx = StorageContext::in_memory();
        ctx.points.set("k", b"v".to_vec()).unwrap();
        ctx.docs.doc_increment("experiment", "n").unwrap();

        let clone = ctx.clone();
        assert_eq!(clone.points.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(clone.docs.doc_increment("experiment", "n").unwrap(), 2);
    }

    #[test]
    fn test_from_config_opens_lmdb() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            lmdb_path: Some(PathBuf::from(dir.path())),
            max_size_mb: 10,
        };
        let ctx = StorageContext::from_config(&config).unwrap();
        assert_eq!(ctx.lists.push_head("data", b"r0".to_vec()).unwrap(), 1);
        assert_eq!(ctx.lists.list_len("data").unwrap(), 1);
    }

    #[test]
    fn test_from_config_rejects_zero_map_size() {
        let config = StorageConfig {
            lmdb_path: None,
            max_size_mb: 0,
        };
        assert!(StorageContext::from_config(&config).is_err());
    }

    #[test]
    fn test_with_points_replaces_only_points() {
        let ctx = StorageContext::in_memory();
        ctx.docs.doc_set("experiment", "k", serde_json::json!(1)).unwrap();

        let ctx = ctx.with_points(Arc::new(MemoryStorage::new()));
        assert!(ctx.points.get("anything").unwrap().is_none());
        assert_eq!(
            ctx.docs.doc_get("experiment", "k").unwrap(),
            Some(serde_json::json!(1))
        );
    }
}
