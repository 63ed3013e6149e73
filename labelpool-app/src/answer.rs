//! Answer recorder.

use labelpool_core::{
    keys, sample_key, LabelPoolConfig, LabeledAnswer, LearningAlgorithm, ProcessAnswerArgs,
    Reply, SampleRow,
};
use labelpool_storage::{safe_read, safe_write, StorageContext};

/// Record a participant's label for a previously issued query.
///
/// Resolves the query, advances the per-algorithm answer counter, forwards
/// the answer to the algorithm and, once the algorithm has accepted it,
/// marks the stored row labeled (the first accepted answer is kept). Any
/// step that cannot complete yields the empty reply. The counter is
/// advanced before the row is read, so an answer whose row has gone
/// missing is still counted.
pub async fn record_answer(
    ctx: &StorageContext,
    alg: &dyn LearningAlgorithm,
    args: &ProcessAnswerArgs,
    config: &LabelPoolConfig,
) -> Reply<LabeledAnswer> {
    let query = match ctx.queries.query_get(args.query_uid) {
        Ok(Some(query)) => query,
        Ok(None) => {
            tracing::warn!(query_uid = %args.query_uid, "unknown query reference");
            return Reply::empty();
        }
        Err(e) => {
            tracing::warn!(query_uid = %args.query_uid, error = %e, "query lookup failed");
            return Reply::empty();
        }
    };

    if query.alg_label != alg.alg_label() {
        tracing::warn!(
            query_alg = %query.alg_label,
            alg = alg.alg_label(),
            "query was issued by a different algorithm"
        );
    }

    let counter = keys::answer_counter(&query.alg_label);
    let answers = match ctx.docs.doc_increment(&config.experiment_doc, &counter) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(counter = %counter, error = %e, "answer counter increment failed");
            return Reply::empty();
        }
    };

    let key = sample_key(query.target_index);
    let Some(mut row) = safe_read::<SampleRow>(ctx.points.as_ref(), &key) else {
        tracing::warn!(index = query.target_index, "labelled row doesn't exist");
        return Reply::empty();
    };

    let answer = LabeledAnswer {
        target_index: query.target_index,
        target_label: args.target_label.clone(),
    };
    if let Err(e) = alg.process_answer(&answer).await {
        tracing::warn!(
            alg_label = %query.alg_label,
            index = answer.target_index,
            error = %e,
            "algorithm rejected answer"
        );
        return Reply::empty();
    }

    if !row.is_labelled() {
        row.label = Some(answer.target_label.clone());
        if !safe_write(ctx.points.as_ref(), &key, &row) {
            tracing::error!(
                alg_label = %query.alg_label,
                index = answer.target_index,
                "accepted answer could not be persisted"
            );
            return Reply::empty();
        }
    }

    tracing::debug!(
        alg_label = %query.alg_label,
        index = answer.target_index,
        answers,
        "answer recorded"
    );
    Reply::Payload(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use labelpool_core::QueryRecord;
    use labelpool_test_utils::fixtures::{self, TARGET_INDEX, TARGET_STUDY};
    use labelpool_test_utils::{FailingPointStore, ScriptedAlgorithm};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn issue(ctx: &StorageContext, index: i64, alg_label: &str) -> Uuid {
        let record = QueryRecord {
            query_uid: Uuid::now_v7(),
            target_index: index,
            alg_label: alg_label.to_string(),
            participant_uid: "p1".to_string(),
            issued_at: Utc::now(),
        };
        ctx.queries.query_put(&record).unwrap();
        record.query_uid
    }

    async fn record(
        ctx: &StorageContext,
        alg: &ScriptedAlgorithm,
        query_uid: Uuid,
        label: &str,
    ) -> Reply<LabeledAnswer> {
        let args = ProcessAnswerArgs {
            query_uid,
            target_label: label.to_string(),
        };
        record_answer(ctx, alg, &args, &LabelPoolConfig::default()).await
    }

    fn seeded_context() -> StorageContext {
        let ctx = StorageContext::in_memory();
        let row = fixtures::sample_row(TARGET_INDEX, TARGET_STUDY);
        safe_write(ctx.points.as_ref(), &row.key(), &row);
        ctx
    }

    fn stored_label(ctx: &StorageContext) -> Option<String> {
        safe_read::<SampleRow>(ctx.points.as_ref(), &sample_key(TARGET_INDEX))
            .unwrap()
            .label
    }

    fn counter(ctx: &StorageContext, alg_label: &str) -> Option<serde_json::Value> {
        ctx.docs
            .doc_get("experiment", &keys::answer_counter(alg_label))
            .unwrap()
    }

    #[tokio::test]
    async fn test_answer_recorded_and_forwarded() {
        let ctx = seeded_context();
        let alg = ScriptedAlgorithm::new("lr");
        let uid = issue(&ctx, TARGET_INDEX, "lr");

        let reply = record(&ctx, &alg, uid, "stem_cells").await;

        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"target_index": 42, "target_label": "stem_cells"})
        );
        assert_eq!(counter(&ctx, "lr"), Some(json!(1)));
        assert_eq!(alg.answers().len(), 1);
        assert_eq!(stored_label(&ctx).as_deref(), Some("stem_cells"));
    }

    #[tokio::test]
    async fn test_first_answer_keeps_row_label() {
        let ctx = seeded_context();
        let alg = ScriptedAlgorithm::new("lr");

        let first = issue(&ctx, TARGET_INDEX, "lr");
        let second = issue(&ctx, TARGET_INDEX, "lr");
        record(&ctx, &alg, first, "tissue").await;
        let reply = record(&ctx, &alg, second, "cell_line").await;

        assert_eq!(
            reply.payload().map(|a| a.target_label.as_str()),
            Some("cell_line")
        );
        assert_eq!(stored_label(&ctx).as_deref(), Some("tissue"));
        assert_eq!(counter(&ctx, "lr"), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_missing_row_counts_but_returns_empty() {
        let ctx = StorageContext::in_memory();
        let alg = ScriptedAlgorithm::new("lr");
        let uid = issue(&ctx, 7, "lr");

        let reply = record(&ctx, &alg, uid, "tissue").await;

        assert!(reply.is_empty());
        assert_eq!(counter(&ctx, "lr"), Some(json!(1)));
        assert!(alg.answers().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_query_is_empty_and_uncounted() {
        let ctx = StorageContext::in_memory();
        let alg = ScriptedAlgorithm::new("lr");
        let reply = record(&ctx, &alg, Uuid::now_v7(), "tissue").await;
        assert!(reply.is_empty());
        assert_eq!(counter(&ctx, "lr"), None);
    }

    #[tokio::test]
    async fn test_rejected_answer_leaves_row_unlabelled() {
        let ctx = seeded_context();
        let rejecting = ScriptedAlgorithm::new("lr").failing_updates();
        let uid = issue(&ctx, TARGET_INDEX, "lr");

        let reply = record(&ctx, &rejecting, uid, "tissue").await;
        assert!(reply.is_empty());
        assert_eq!(stored_label(&ctx), None);

        // a later accepted answer still labels the row
        let accepting = ScriptedAlgorithm::new("lr");
        let retry = issue(&ctx, TARGET_INDEX, "lr");
        let reply = record(&ctx, &accepting, retry, "stem_cells").await;
        assert_eq!(
            reply.payload().map(|a| a.target_label.as_str()),
            Some("stem_cells")
        );
        assert_eq!(stored_label(&ctx).as_deref(), Some("stem_cells"));
    }

    #[tokio::test]
    async fn test_unpersisted_label_is_not_confirmed() {
        let seeded = seeded_context();
        let points = FailingPointStore::wrap(seeded.points.clone())
            .fail_writes_to(sample_key(TARGET_INDEX));
        let ctx = seeded.with_points(Arc::new(points));
        let alg = ScriptedAlgorithm::new("lr");
        let uid = issue(&ctx, TARGET_INDEX, "lr");

        let reply = record(&ctx, &alg, uid, "tissue").await;

        assert!(reply.is_empty());
        assert_eq!(stored_label(&ctx), None);
    }

    #[tokio::test]
    async fn test_already_labelled_row_needs_no_write() {
        let seeded = seeded_context();
        let mut row = fixtures::sample_row(TARGET_INDEX, TARGET_STUDY);
        row.label = Some("tissue".to_string());
        safe_write(seeded.points.as_ref(), &row.key(), &row);
        let points = FailingPointStore::wrap(seeded.points.clone()).fail_all_writes();
        let ctx = seeded.with_points(Arc::new(points));
        let alg = ScriptedAlgorithm::new("lr");
        let uid = issue(&ctx, TARGET_INDEX, "lr");

        let reply = record(&ctx, &alg, uid, "cell_line").await;

        assert_eq!(reply.payload().map(|a| a.target_index), Some(TARGET_INDEX));
        assert_eq!(stored_label(&ctx).as_deref(), Some("tissue"));
    }

    #[tokio::test]
    async fn test_counter_uses_issuing_algorithm_label() {
        let ctx = seeded_context();
        let alg = ScriptedAlgorithm::new("lr");
        let uid = issue(&ctx, TARGET_INDEX, "other");

        record(&ctx, &alg, uid, "tissue").await;
        assert_eq!(counter(&ctx, "other"), Some(json!(1)));
        assert_eq!(counter(&ctx, "lr"), None);
    }
}
