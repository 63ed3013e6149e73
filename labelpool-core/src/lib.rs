//! labelpool Core - Data Types, Codec, and Pure Resolution Logic
//!
//! Everything here is storage-agnostic. Storage lives in
//! `labelpool-storage`; the host entry points live in `labelpool-app`.

pub mod algorithm;
pub mod classes;
pub mod codec;
pub mod config;
pub mod entities;
pub mod error;
pub mod literal;
pub mod ontology;
pub mod payload;

pub use algorithm::{
    refresh_due, snapshot_interval, AlgorithmInit, LabeledAnswer, LearningAlgorithm,
};
pub use classes::{decode_class_codes, SampleClass};
pub use codec::{decode, decode_value, encode, encode_value, encoding_of, Encoding, Table};
pub use config::{LabelPoolConfig, LoadPolicy, StorageConfig};
pub use entities::{sample_key, Dataset, LabelRow, PoolType, SampleIndex, SampleRow, StudyRecord};
pub use error::{
    AlgorithmError, CodecError, ConfigError, FieldError, LabelPoolError, LabelPoolResult,
    LoadError, StorageError,
};
pub use literal::{decode_coded_mapping, decode_ontology_codes, parse_literal};
pub use ontology::{normalize_code, resolve_link, OntologyLinks};
pub use payload::{
    EmptyReply, GetQueryArgs, InitArgs, ProcessAnswerArgs, QueryPayload, QueryRecord, Reply,
    Targets,
};

// ============================================================================
// PERSISTED KEYS
// ============================================================================

/// Point-store keys written during partitioning and read while serving.
pub mod keys {
    pub const BATCH_NO: &str = "batch_no";
    pub const TRAIN_DATA: &str = "train_data";
    pub const TEST_DATA: &str = "test_data";
    pub const UNLABELLED_DATA: &str = "unlabelled_data";
    pub const LABEL_DATA: &str = "label_data";
    pub const UNLABELLED_LIST: &str = "unlabelled_list";
    pub const STUDY_ID_LIST: &str = "study_id_list";
    pub const TRAIN_LIST: &str = "train_list";
    pub const ACC_LIST: &str = "acc_list";
    pub const CUR_CONFIDENCE: &str = "cur_confidence";
    pub const LR_CLASSES: &str = "lr_classes";

    /// Document-store key for the ordered unlabeled list length.
    pub const UNLABELLED_LEN: &str = "unlabelled_len";

    /// Document-store key of the per-algorithm answer counter.
    pub fn answer_counter(alg_label: &str) -> String {
        format!("num_reported_answers_for_{}", alg_label)
    }
}
