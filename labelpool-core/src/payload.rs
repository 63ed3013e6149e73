//! Entry-point argument and response payload types.

use crate::entities::{SampleIndex, SampleRow};
use crate::ontology::OntologyLinks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Serializes as `{}`; signals "nothing to return" to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyReply {}

/// Entry-point response: a payload or the empty object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Payload(T),
    Empty(EmptyReply),
}

impl<T> Reply<T> {
    pub fn empty() -> Self {
        Reply::Empty(EmptyReply {})
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Reply::Payload(p) => Some(p),
            Reply::Empty(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            Reply::Payload(p) => Some(p),
            Reply::Empty(_) => None,
        }
    }
}

impl<T> From<Option<T>> for Reply<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Reply::Payload).unwrap_or_else(Reply::empty)
    }
}

/// The `targets` argument block of experiment initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub targetset: Vec<Value>,
}

/// Arguments to experiment initialization.
///
/// Unknown keys are carried through untouched so the host gets its own
/// arguments back, augmented with `n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitArgs {
    pub targets: Targets,
    pub failure_probability: f64,
    pub d: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arguments to query selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetQueryArgs {
    pub participant_uid: String,
}

/// Arguments to answer recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessAnswerArgs {
    pub query_uid: Uuid,
    pub target_label: String,
}

/// What the host remembers about an issued query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_uid: Uuid,
    pub target_index: SampleIndex,
    pub alg_label: String,
    pub participant_uid: String,
    pub issued_at: DateTime<Utc>,
}

/// Enriched query handed to the participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPayload {
    pub target_indices: SampleRow,
    /// Parent study fields, or `{}` when the study is unknown
    pub study: Value,
    pub key_value: Map<String, Value>,
    pub ontology_mapping: OntologyLinks,
    /// Side-channel state as the algorithm wrote it, `[]` until first written
    pub cur_confidence: Value,
    pub lr_classes: Value,
    pub sra_sample_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::LabeledAnswer;
    use serde_json::json;

    #[test]
    fn test_empty_reply_serializes_as_empty_object() {
        let reply: Reply<LabeledAnswer> = Reply::empty();
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({}));
        assert!(reply.is_empty());
    }

    #[test]
    fn test_payload_reply_serializes_inner_value() {
        let reply = Reply::Payload(LabeledAnswer {
            target_index: 42,
            target_label: "stem_cells".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"target_index": 42, "target_label": "stem_cells"})
        );
    }

    #[test]
    fn test_init_args_keep_unknown_keys() {
        let args: InitArgs = serde_json::from_value(json!({
            "targets": {"targetset": [1, 2, 3]},
            "failure_probability": 0.05,
            "d": 8,
            "alg_list": ["LogisticRegressionActive"]
        }))
        .unwrap();

        assert_eq!(args.targets.targetset.len(), 3);
        assert!(args.n.is_none());
        assert!(args.extra.contains_key("alg_list"));

        let back = serde_json::to_value(&args).unwrap();
        assert_eq!(back["alg_list"], json!(["LogisticRegressionActive"]));
        assert!(back.get("n").is_none());
    }

    #[test]
    fn test_reply_from_option() {
        let some: Reply<i32> = Some(3).into();
        let none: Reply<i32> = None.into();
        assert_eq!(some.payload(), Some(&3));
        assert!(none.is_empty());
    }
}
