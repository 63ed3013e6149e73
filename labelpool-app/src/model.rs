//! Model snapshot accessor.

use labelpool_core::{LearningAlgorithm, Reply};
use serde_json::Value;

/// Return the algorithm's current model verbatim, or the empty reply if
/// it has none to give.
pub async fn model_snapshot(alg: &dyn LearningAlgorithm) -> Reply<Value> {
    match alg.model().await {
        Ok(model) => Reply::Payload(model),
        Err(e) => {
            tracing::warn!(alg_label = alg.alg_label(), error = %e, "model unavailable");
            Reply::empty()
        }
    }
}
