//! Query orchestrator: turns the algorithm's chosen index into the
//! enriched payload shown to a participant.

use labelpool_core::{
    decode_coded_mapping, decode_ontology_codes, keys, sample_key, LearningAlgorithm,
    OntologyLinks, QueryPayload, Reply, SampleRow,
};
use labelpool_storage::{safe_read, StorageContext};
use serde_json::{Map, Value};

/// Ask the algorithm for a sample and assemble its payload.
///
/// Returns the empty reply when the algorithm fails or when no row is
/// stored at the chosen index. Nothing is written.
pub async fn serve_query(
    ctx: &StorageContext,
    alg: &dyn LearningAlgorithm,
    participant_uid: &str,
) -> Reply<QueryPayload> {
    let index = match alg.select_query(participant_uid).await {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(
                alg_label = alg.alg_label(),
                participant_uid,
                error = %e,
                "query selection failed"
            );
            return Reply::empty();
        }
    };

    let Some(row) = safe_read::<SampleRow>(ctx.points.as_ref(), &sample_key(index)) else {
        tracing::info!(index, participant_uid, "no row stored for selected index");
        return Reply::empty();
    };

    Reply::Payload(enrich(ctx, row))
}

/// Build the payload for a stored row. Malformed structured fields and
/// unknown studies degrade to empty values.
pub fn enrich(ctx: &StorageContext, row: SampleRow) -> QueryPayload {
    let key_value = decode_coded_mapping(row.key_value.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(
            index = row.index,
            error = %e,
            "coded-mapping field unreadable, using empty"
        );
        Map::new()
    });
    let codes = decode_ontology_codes(row.ontology_mapping.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(index = row.index, error = %e, "ontology field unreadable, using empty");
        Vec::new()
    });
    let ontology_mapping = OntologyLinks::resolve_all(&codes);

    let study = row
        .sra_study_id
        .as_deref()
        .and_then(|id| safe_read::<Value>(ctx.points.as_ref(), id))
        .unwrap_or_else(|| Value::Object(Map::new()));

    let cur_confidence = side_channel(ctx, keys::CUR_CONFIDENCE);
    let lr_classes = side_channel(ctx, keys::LR_CLASSES);

    QueryPayload {
        sra_sample_id: row.sra_sample_id.clone(),
        target_indices: row,
        study,
        key_value,
        ontology_mapping,
        cur_confidence,
        lr_classes,
    }
}

/// Algorithm-owned state under `key`, served verbatim; `[]` when absent.
fn side_channel(ctx: &StorageContext, key: &str) -> Value {
    safe_read::<Value>(ctx.points.as_ref(), key).unwrap_or_else(|| Value::Array(Vec::new()))
}
