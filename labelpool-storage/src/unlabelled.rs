//! Tail-indexed view over the ordered unlabeled list.

use crate::context::StorageContext;
use labelpool_core::{codec, keys, LabelPoolResult, SampleRow};
use tracing::warn;

/// Read access to unlabeled rows by the order the partitioner pushed them.
///
/// Offsets are resolved against the list length at the moment of each
/// read, so offset `p` always names the `p`-th pushed row.
#[derive(Debug, Clone)]
pub struct UnlabelledPool {
    ctx: StorageContext,
    list_key: String,
    experiment_doc: String,
}

impl UnlabelledPool {
    pub fn new(
        ctx: StorageContext,
        list_key: impl Into<String>,
        experiment_doc: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            list_key: list_key.into(),
            experiment_doc: experiment_doc.into(),
        }
    }

    pub fn list_key(&self) -> &str {
        &self.list_key
    }

    /// The `p`-th pushed row, or `None` if out of range or undecodable.
    pub fn item(&self, p: u64) -> LabelPoolResult<Option<SampleRow>> {
        let Some(blob) = self.ctx.lists.index_from_tail(&self.list_key, p)? else {
            return Ok(None);
        };
        match codec::decode(&blob) {
            Ok(row) => Ok(Some(row)),
            Err(e) => {
                warn!(
                    list = %self.list_key,
                    offset = p,
                    error = %e,
                    "unlabelled item decode failed"
                );
                Ok(None)
            }
        }
    }

    /// Current list length.
    pub fn len(&self) -> LabelPoolResult<u64> {
        self.ctx.lists.list_len(&self.list_key)
    }

    pub fn is_empty(&self) -> LabelPoolResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Length recorded by the partitioner in the document store.
    pub fn recorded_len(&self) -> LabelPoolResult<Option<u64>> {
        Ok(self
            .ctx
            .docs
            .doc_get(&self.experiment_doc, keys::UNLABELLED_LEN)?
            .and_then(|v| v.as_u64()))
    }
}
