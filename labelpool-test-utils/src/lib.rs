//! labelpool Test Utilities
//!
//! Shared test infrastructure for the labelpool workspace:
//! - A scripted learning algorithm with recorded calls
//! - A point store that fails on demand
//! - Dataset fixtures
//! - Proptest generators

pub use labelpool_storage::{MemoryStorage, StorageContext};

pub use labelpool_core::{
    AlgorithmError, AlgorithmInit, Dataset, InitArgs, LabelPoolError, LabelPoolResult,
    LabelRow, LabeledAnswer, LearningAlgorithm, PoolType, SampleIndex, SampleRow, StorageError,
    StudyRecord, Targets,
};

use async_trait::async_trait;
use labelpool_core::{decode_class_codes, keys, refresh_due};
use labelpool_storage::{safe_write, PointStore};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// SCRIPTED ALGORITHM
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> LabelPoolResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| LabelPoolError::Storage(StorageError::LockPoisoned))
}

/// Learning algorithm with a scripted query sequence.
///
/// Queries come from a queue first, then from a fixed fallback index.
/// Every initialization and answer is recorded. When given a storage
/// context it publishes its side-channel state (confidence vector and
/// class labels) at each refresh point.
#[derive(Debug)]
pub struct ScriptedAlgorithm {
    alg_label: String,
    queue: Mutex<VecDeque<SampleIndex>>,
    fallback: Option<SampleIndex>,
    init: Mutex<Option<AlgorithmInit>>,
    answers: Mutex<Vec<LabeledAnswer>>,
    refreshes: AtomicUsize,
    storage: Option<StorageContext>,
    confidence: Vec<f64>,
    class_codes: Vec<i64>,
    fail_init: bool,
    fail_queries: bool,
    fail_updates: bool,
}

impl ScriptedAlgorithm {
    pub fn new(alg_label: impl Into<String>) -> Self {
        Self {
            alg_label: alg_label.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            init: Mutex::new(None),
            answers: Mutex::new(Vec::new()),
            refreshes: AtomicUsize::new(0),
            storage: None,
            confidence: Vec::new(),
            class_codes: Vec::new(),
            fail_init: false,
            fail_queries: false,
            fail_updates: false,
        }
    }

    /// Always select `index` once the queue is exhausted.
    pub fn selecting(mut self, index: SampleIndex) -> Self {
        self.fallback = Some(index);
        self
    }

    pub fn with_queue(self, indices: impl IntoIterator<Item = SampleIndex>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(indices);
        }
        self
    }

    /// Publish `confidence` and the decoded `class_codes` at refresh points.
    pub fn with_side_channel(
        mut self,
        storage: StorageContext,
        confidence: Vec<f64>,
        class_codes: Vec<i64>,
    ) -> Self {
        self.storage = Some(storage);
        self.confidence = confidence;
        self.class_codes = class_codes;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn initialized_with(&self) -> Option<AlgorithmInit> {
        self.init.lock().ok().and_then(|init| init.clone())
    }

    pub fn answers(&self) -> Vec<LabeledAnswer> {
        self.answers
            .lock()
            .map(|answers| answers.clone())
            .unwrap_or_default()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn publish_side_channel(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let classes: Vec<Value> = decode_class_codes(&self.class_codes)
            .into_iter()
            .map(|name| name.map(Value::from).unwrap_or(Value::Null))
            .collect();
        safe_write(storage.points.as_ref(), keys::CUR_CONFIDENCE, &self.confidence);
        safe_write(storage.points.as_ref(), keys::LR_CLASSES, &classes);
    }
}

#[async_trait]
impl LearningAlgorithm for ScriptedAlgorithm {
    fn alg_label(&self) -> &str {
        &self.alg_label
    }

    async fn initialize(&self, init: &AlgorithmInit) -> LabelPoolResult<()> {
        if self.fail_init {
            return Err(AlgorithmError::InitFailed {
                alg_label: self.alg_label.clone(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        *lock(&self.init)? = Some(init.clone());
        Ok(())
    }

    async fn select_query(&self, _participant_uid: &str) -> LabelPoolResult<SampleIndex> {
        if self.fail_queries {
            return Err(AlgorithmError::QueryFailed {
                alg_label: self.alg_label.clone(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        if let Some(index) = lock(&self.queue)?.pop_front() {
            return Ok(index);
        }
        self.fallback.ok_or_else(|| {
            AlgorithmError::QueryFailed {
                alg_label: self.alg_label.clone(),
                reason: "query script exhausted".to_string(),
            }
            .into()
        })
    }

    async fn process_answer(&self, answer: &LabeledAnswer) -> LabelPoolResult<()> {
        if self.fail_updates {
            return Err(AlgorithmError::UpdateFailed {
                alg_label: self.alg_label.clone(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        let count = {
            let mut answers = lock(&self.answers)?;
            answers.push(answer.clone());
            answers.len() as i64
        };
        let d = lock(&self.init)?.as_ref().map(|init| init.d).unwrap_or(0);
        if refresh_due(count, d) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            self.publish_side_channel();
        }
        Ok(())
    }

    async fn model(&self) -> LabelPoolResult<Value> {
        let init = lock(&self.init)?.clone().ok_or_else(|| AlgorithmError::ModelUnavailable {
            alg_label: self.alg_label.clone(),
        })?;
        Ok(json!({
            "alg_label": self.alg_label,
            "n": init.n,
            "d": init.d,
            "answers": lock(&self.answers)?.len(),
            "refreshes": self.refresh_count(),
        }))
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// Point store that fails selected operations and delegates the rest.
pub struct FailingPointStore {
    inner: Arc<dyn PointStore>,
    failing_writes: HashSet<String>,
    fail_all_writes: bool,
    failing_reads: HashSet<String>,
}

impl FailingPointStore {
    pub fn new() -> Self {
        Self::wrap(Arc::new(MemoryStorage::new()))
    }

    pub fn wrap(inner: Arc<dyn PointStore>) -> Self {
        Self {
            inner,
            failing_writes: HashSet::new(),
            fail_all_writes: false,
            failing_reads: HashSet::new(),
        }
    }

    pub fn fail_writes_to(mut self, key: impl Into<String>) -> Self {
        self.failing_writes.insert(key.into());
        self
    }

    pub fn fail_all_writes(mut self) -> Self {
        self.fail_all_writes = true;
        self
    }

    pub fn fail_reads_of(mut self, key: impl Into<String>) -> Self {
        self.failing_reads.insert(key.into());
        self
    }
}

impl Default for FailingPointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PointStore for FailingPointStore {
    fn set(&self, key: &str, blob: Vec<u8>) -> LabelPoolResult<()> {
        if self.fail_all_writes || self.failing_writes.contains(key) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.inner.set(key, blob)
    }

    fn get(&self, key: &str) -> LabelPoolResult<Option<Vec<u8>>> {
        if self.failing_reads.contains(key) {
            return Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.inner.get(key)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use serde_json::Map;
    use std::collections::BTreeMap;

    /// Unlabeled sample used by end-to-end scenarios.
    pub const TARGET_INDEX: SampleIndex = 42;
    pub const TARGET_STUDY: &str = "SRP000042";

    /// A fully populated sample row belonging to `study`.
    pub fn sample_row(index: SampleIndex, study: &str) -> SampleRow {
        let mut attributes = BTreeMap::new();
        attributes.insert("feature_0".to_string(), json!(index as f64 * 0.5));
        attributes.insert("feature_1".to_string(), json!(1.25));
        SampleRow {
            index,
            sra_sample_id: Some(format!("SRS{:06}", index)),
            sra_study_id: Some(study.to_string()),
            key_value: Some("{'cell type': 'T cell', 'tissue': 'blood'}".to_string()),
            ontology_mapping: Some("['CL:0000084', 'UBERON:0000178']".to_string()),
            label: None,
            attributes,
        }
    }

    pub fn study(id: &str) -> StudyRecord {
        let mut attributes = BTreeMap::new();
        attributes.insert("study_title".to_string(), json!(format!("Study {}", id)));
        StudyRecord {
            sra_study_id: id.to_string(),
            attributes,
        }
    }

    pub fn label(
        index: SampleIndex,
        pool: PoolType,
        label: Option<&str>,
        batch_no: Option<i64>,
    ) -> LabelRow {
        LabelRow {
            index,
            dataset_type: pool,
            label: label.map(str::to_string),
            batch_no,
        }
    }

    /// Seven samples: 1–2 train, 3 test, 4, 5, 6 and 42 unlabeled.
    /// Pre-existing batch numbers go up to 2.
    pub fn small_dataset() -> Dataset {
        let mut samples: Vec<SampleRow> = (1..=6).map(|i| sample_row(i, "SRP000001")).collect();
        samples.push(sample_row(TARGET_INDEX, TARGET_STUDY));

        Dataset {
            samples,
            labels: vec![
                label(1, PoolType::Train, Some("tissue"), None),
                label(2, PoolType::Train, Some("cell_line"), None),
                label(3, PoolType::Test, Some("primary_cells"), None),
                label(4, PoolType::Unlabelled, None, Some(1)),
                label(5, PoolType::Unlabelled, None, Some(2)),
                label(6, PoolType::Unlabelled, None, None),
                label(TARGET_INDEX, PoolType::Unlabelled, None, None),
            ],
            studies: vec![study("SRP000001"), study(TARGET_STUDY)],
        }
    }

    /// `small_dataset` with broken structured fields on sample 5 and an
    /// absent ontology list on sample 6.
    pub fn dataset_with_malformed_fields() -> Dataset {
        let mut dataset = small_dataset();
        for row in &mut dataset.samples {
            match row.index {
                5 => {
                    row.key_value = Some("{'cell type': ".to_string());
                    row.ontology_mapping = Some("['CL:0000084'".to_string());
                }
                6 => row.ontology_mapping = None,
                _ => {}
            }
        }
        dataset
    }

    /// Init arguments with an `n`-element target set.
    pub fn init_args(n: usize) -> InitArgs {
        let mut extra = Map::new();
        extra.insert("alg_list".to_string(), json!(["ScriptedAlgorithm"]));
        InitArgs {
            targets: Targets {
                targetset: (0..n).map(|i| json!(i)).collect(),
            },
            failure_probability: 0.05,
            d: 8,
            n: None,
            extra,
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    pub fn arb_pool_type() -> impl Strategy<Value = PoolType> {
        prop_oneof![
            Just(PoolType::Train),
            Just(PoolType::Test),
            Just(PoolType::Unlabelled),
        ]
    }

    /// Ontology field text: valid lists, `None`, absent, or malformed.
    pub fn arb_ontology_field() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("None".to_string())),
            Just(Some("['CL:0000084']".to_string())),
            Just(Some("['UBERON:0000178', 'EFO:0000001', 'XX:1']".to_string())),
            Just(Some("['CL:0000084'".to_string())),
        ]
    }

    pub fn arb_key_value_field() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("{'cell type': 'T cell'}".to_string())),
            Just(Some("{u'age': 42L, 'sex': None}".to_string())),
            Just(Some("{'broken'".to_string())),
        ]
    }

    pub fn arb_sample_row(index: SampleIndex) -> impl Strategy<Value = SampleRow> {
        (
            arb_key_value_field(),
            arb_ontology_field(),
            prop::collection::vec(-1.0e6f64..1.0e6, 0..4),
        )
            .prop_map(move |(key_value, ontology_mapping, features)| {
                let attributes: BTreeMap<String, Value> = features
                    .into_iter()
                    .enumerate()
                    .map(|(i, f)| (format!("feature_{}", i), json!(f)))
                    .collect();
                SampleRow {
                    index,
                    sra_sample_id: Some(format!("SRS{:06}", index)),
                    sra_study_id: Some("SRP000001".to_string()),
                    key_value,
                    ontology_mapping,
                    label: None,
                    attributes,
                }
            })
    }

    pub fn arb_label_row(max_index: SampleIndex) -> impl Strategy<Value = LabelRow> {
        (
            0..max_index,
            arb_pool_type(),
            prop::option::of("[a-z_]{3,12}"),
            prop::option::of(0i64..5),
        )
            .prop_map(|(index, dataset_type, label, batch_no)| LabelRow {
                index,
                dataset_type,
                label,
                batch_no,
            })
    }

    /// Dataset over indices `0..32` whose label table may name an index
    /// more than once, or name indices with no sample.
    pub fn arb_dataset() -> impl Strategy<Value = Dataset> {
        let samples = (0i64..32)
            .map(arb_sample_row)
            .collect::<Vec<_>>();
        (samples, prop::collection::vec(arb_label_row(40), 0..48)).prop_map(|(samples, labels)| {
            Dataset {
                samples,
                labels,
                studies: Vec::new(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_store_only_fails_selected_keys() {
        let store = FailingPointStore::new().fail_writes_to("bad");
        assert!(store.set("good", vec![1]).is_ok());
        assert!(store.set("bad", vec![1]).is_err());
        assert_eq!(store.get("good").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_small_dataset_has_target() {
        let dataset = fixtures::small_dataset();
        let indices: Vec<SampleIndex> = dataset.samples.iter().map(|s| s.index).collect();
        assert!(indices.contains(&fixtures::TARGET_INDEX));
        assert_eq!(dataset.labels.len(), dataset.samples.len());
    }
}
