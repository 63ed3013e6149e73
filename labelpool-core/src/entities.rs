//! Dataset entity types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Unique integer identifier of a sample across the whole dataset.
pub type SampleIndex = i64;

/// Point-store key for a sample row.
pub fn sample_key(index: SampleIndex) -> String {
    index.to_string()
}

/// One of the three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Train,
    Test,
    #[serde(alias = "unlabeled")]
    Unlabelled,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PoolType::Train => "train",
            PoolType::Test => "test",
            PoolType::Unlabelled => "unlabelled",
        };
        f.write_str(tag)
    }
}

/// One dataset record.
///
/// Feature columns vary by dataset and live in `attributes`; the handful of
/// fields the serving core reads are typed. `key_value` and
/// `ontology_mapping` hold string-literal encodings and are decoded lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    pub index: SampleIndex,
    #[serde(default)]
    pub sra_sample_id: Option<String>,
    #[serde(default)]
    pub sra_study_id: Option<String>,
    #[serde(default)]
    pub key_value: Option<String>,
    #[serde(default)]
    pub ontology_mapping: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl SampleRow {
    /// Bare row with only an index.
    pub fn new(index: SampleIndex) -> Self {
        Self {
            index,
            sra_sample_id: None,
            sra_study_id: None,
            key_value: None,
            ontology_mapping: None,
            label: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> String {
        sample_key(self.index)
    }

    pub fn is_labelled(&self) -> bool {
        self.label.is_some()
    }

    /// Index plus structured sub-fields, feature columns dropped.
    pub fn metadata_projection(&self) -> Self {
        Self {
            index: self.index,
            sra_sample_id: None,
            sra_study_id: None,
            key_value: self.key_value.clone(),
            ontology_mapping: self.ontology_mapping.clone(),
            label: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// One study row, addressed by its study identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub sra_study_id: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// One row of the label table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    pub index: SampleIndex,
    pub dataset_type: PoolType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub batch_no: Option<i64>,
}

/// Full input to partitioning: samples, labels, and optional studies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub samples: Vec<SampleRow>,
    pub labels: Vec<LabelRow>,
    #[serde(default)]
    pub studies: Vec<StudyRecord>,
}
