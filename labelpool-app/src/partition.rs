//! Pool partitioner.
//!
//! Splits a dataset into train, test, and unlabeled pools, stores every
//! unlabeled row under its index and on the ordered list, stores study
//! rows under their identifiers, and persists the aggregate tables.
//! Individual write failures never abort the load; they are collected in
//! a [`LoadReport`] and the caller's [`LoadPolicy`] decides what to do.

use chrono::{DateTime, Utc};
use labelpool_core::{
    decode_coded_mapping, decode_ontology_codes, keys, Dataset, LabelPoolConfig, LabelPoolResult,
    LabelRow, LoadError, LoadPolicy, PoolType, SampleIndex, SampleRow,
};
use labelpool_storage::{safe_push, write_outcome, StorageContext, WriteOutcome};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// A write that did not reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of one partitioning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub batch_no: i64,
    pub train_count: usize,
    pub test_count: usize,
    pub unlabelled_count: usize,
    /// Unlabeled rows stored under their index
    pub rows_written: usize,
    /// Unlabeled rows pushed onto the ordered list
    pub rows_pushed: usize,
    pub row_failures: Vec<WriteFailure>,
    pub studies_written: usize,
    pub study_failures: Vec<WriteFailure>,
    /// Batch number, aggregate tables, index lists, and `unlabelled_len`
    pub aggregate_failures: Vec<WriteFailure>,
    /// Unlabeled rows whose coded-mapping or ontology text does not parse
    pub malformed_fields: usize,
    /// Label rows ignored because their index was already assigned a pool
    pub duplicate_labels: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            batch_no: 0,
            train_count: 0,
            test_count: 0,
            unlabelled_count: 0,
            rows_written: 0,
            rows_pushed: 0,
            row_failures: Vec::new(),
            studies_written: 0,
            study_failures: Vec::new(),
            aggregate_failures: Vec::new(),
            malformed_fields: 0,
            duplicate_labels: 0,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn failed_writes(&self) -> usize {
        self.row_failures.len() + self.study_failures.len() + self.aggregate_failures.len()
    }

    pub fn attempted_writes(&self) -> usize {
        self.rows_written + self.rows_pushed + self.studies_written + self.failed_writes()
            + self.aggregate_successes()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_writes() == 0
    }

    /// Fail under [`LoadPolicy::Strict`] if anything was not stored.
    pub fn enforce(&self, policy: LoadPolicy) -> LabelPoolResult<()> {
        match policy {
            LoadPolicy::Strict if !self.is_complete() => Err(LoadError::PartialLoad {
                attempted: self.attempted_writes(),
                failed: self.failed_writes(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn aggregate_successes(&self) -> usize {
        AGGREGATE_WRITES.saturating_sub(self.aggregate_failures.len())
    }

    fn record(target: &mut Vec<WriteFailure>, key: &str, outcome: WriteOutcome) -> bool {
        match outcome {
            WriteOutcome::Stored => true,
            WriteOutcome::Failed { reason } => {
                target.push(WriteFailure {
                    key: key.to_string(),
                    reason,
                });
                false
            }
        }
    }
}

/// batch_no, the six tables and lists, the two empty lists, unlabelled_len
const AGGREGATE_WRITES: usize = 10;

/// Index sets per pool. Each index lands in at most one pool.
#[derive(Debug, Default)]
struct PoolIndex<'a> {
    assigned: HashMap<SampleIndex, &'a LabelRow>,
    train: HashSet<SampleIndex>,
    test: HashSet<SampleIndex>,
    unlabelled: HashSet<SampleIndex>,
    duplicates: usize,
}

impl<'a> PoolIndex<'a> {
    fn build(labels: &'a [LabelRow]) -> Self {
        let mut index = Self::default();
        for row in labels {
            if index.assigned.contains_key(&row.index) {
                index.duplicates += 1;
                warn!(
                    index = row.index,
                    pool = %row.dataset_type,
                    "duplicate label row ignored, index already assigned a pool"
                );
                continue;
            }
            index.assigned.insert(row.index, row);
            match row.dataset_type {
                PoolType::Train => index.train.insert(row.index),
                PoolType::Test => index.test.insert(row.index),
                PoolType::Unlabelled => index.unlabelled.insert(row.index),
            };
        }
        index
    }

    fn label_of(&self, index: SampleIndex) -> Option<String> {
        self.assigned.get(&index).and_then(|row| row.label.clone())
    }
}

/// Next batch number: one past the largest recorded, or 1 if none.
pub fn next_batch_no(labels: &[LabelRow]) -> i64 {
    labels.iter().filter_map(|row| row.batch_no).max().unwrap_or(0) + 1
}

/// Whether either structured field of `row` fails to parse.
fn has_malformed_fields(row: &SampleRow) -> bool {
    let mut malformed = false;
    if let Err(e) = decode_coded_mapping(row.key_value.as_deref()) {
        warn!(index = row.index, error = %e, "malformed coded-mapping field");
        malformed = true;
    }
    if let Err(e) = decode_ontology_codes(row.ontology_mapping.as_deref()) {
        warn!(index = row.index, error = %e, "malformed ontology field");
        malformed = true;
    }
    malformed
}

/// Writes a dataset into storage according to a [`LabelPoolConfig`].
pub struct PoolPartitioner<'a> {
    ctx: &'a StorageContext,
    config: &'a LabelPoolConfig,
}

impl<'a> PoolPartitioner<'a> {
    pub fn new(ctx: &'a StorageContext, config: &'a LabelPoolConfig) -> Self {
        Self { ctx, config }
    }

    /// Run the load. Only configuration errors are returned; write
    /// failures end up in the report.
    pub fn run(&self, dataset: &Dataset) -> LabelPoolResult<LoadReport> {
        self.config.validate()?;
        let mut report = LoadReport::new(Utc::now());
        let pools = PoolIndex::build(&dataset.labels);
        report.duplicate_labels = pools.duplicates;

        let batch_no = next_batch_no(&dataset.labels);
        report.batch_no = batch_no;
        self.aggregate(&mut report, keys::BATCH_NO, &batch_no);

        let train: Vec<SampleRow> = dataset
            .samples
            .iter()
            .filter(|row| pools.train.contains(&row.index))
            .map(|row| SampleRow {
                label: pools.label_of(row.index),
                ..row.clone()
            })
            .collect();
        let test: Vec<SampleRow> = dataset
            .samples
            .iter()
            .filter(|row| pools.test.contains(&row.index))
            .map(|row| SampleRow {
                label: pools.label_of(row.index),
                ..row.clone()
            })
            .collect();
        let unlabelled: Vec<&SampleRow> = dataset
            .samples
            .iter()
            .filter(|row| pools.unlabelled.contains(&row.index))
            .collect();

        report.train_count = train.len();
        report.test_count = test.len();
        report.unlabelled_count = unlabelled.len();

        self.store_unlabelled(&mut report, &unlabelled);
        self.store_studies(&mut report, dataset);

        let unlabelled_list: Vec<SampleIndex> = unlabelled.iter().map(|row| row.index).collect();
        let study_id_list: Vec<Option<String>> = unlabelled
            .iter()
            .map(|row| row.sra_study_id.clone())
            .collect();
        let unlabelled_data: Vec<SampleRow> = unlabelled
            .iter()
            .map(|row| row.metadata_projection())
            .collect();
        let empty: Vec<Value> = Vec::new();

        self.aggregate(&mut report, keys::STUDY_ID_LIST, &study_id_list);
        self.aggregate(&mut report, keys::TRAIN_DATA, &train);
        self.aggregate(&mut report, keys::TEST_DATA, &test);
        self.aggregate(&mut report, keys::UNLABELLED_DATA, &unlabelled_data);
        self.aggregate(&mut report, keys::LABEL_DATA, &dataset.labels);
        self.aggregate(&mut report, keys::UNLABELLED_LIST, &unlabelled_list);
        self.aggregate(&mut report, keys::TRAIN_LIST, &empty);
        self.aggregate(&mut report, keys::ACC_LIST, &empty);
        self.record_unlabelled_len(&mut report);

        report.finished_at = Utc::now();
        info!(
            batch_no = report.batch_no,
            train = report.train_count,
            test = report.test_count,
            unlabelled = report.unlabelled_count,
            rows_written = report.rows_written,
            failed = report.failed_writes(),
            malformed_fields = report.malformed_fields,
            "partitioning complete"
        );
        Ok(report)
    }

    fn store_unlabelled(&self, report: &mut LoadReport, rows: &[&SampleRow]) {
        let list_key = &self.config.data_list_key;
        for (i, row) in rows.iter().enumerate() {
            if has_malformed_fields(row) {
                report.malformed_fields += 1;
            }

            let key = row.key();
            let outcome = write_outcome(self.ctx.points.as_ref(), &key, *row);
            if LoadReport::record(&mut report.row_failures, &key, outcome) {
                report.rows_written += 1;
            }

            match safe_push(self.ctx.lists.as_ref(), list_key, *row) {
                Some(_) => report.rows_pushed += 1,
                None => report.row_failures.push(WriteFailure {
                    key: format!("{}[{}]", list_key, row.index),
                    reason: "list push failed".to_string(),
                }),
            }

            if (i + 1) % self.config.progress_every == 0 {
                info!(rows = i + 1, total = rows.len(), "unlabelled rows stored");
            }
        }
        info!(rows = rows.len(), "done storing unlabelled rows");
    }

    fn store_studies(&self, report: &mut LoadReport, dataset: &Dataset) {
        for study in &dataset.studies {
            let key = &study.sra_study_id;
            let outcome = write_outcome(self.ctx.points.as_ref(), key, study);
            if LoadReport::record(&mut report.study_failures, key, outcome) {
                report.studies_written += 1;
            }
        }
    }

    fn aggregate<T: Serialize + ?Sized>(&self, report: &mut LoadReport, key: &str, value: &T) {
        let outcome = write_outcome(self.ctx.points.as_ref(), key, value);
        LoadReport::record(&mut report.aggregate_failures, key, outcome);
    }

    fn record_unlabelled_len(&self, report: &mut LoadReport) {
        let result = self
            .ctx
            .lists
            .list_len(&self.config.data_list_key)
            .and_then(|len| {
                self.ctx
                    .docs
                    .doc_set(&self.config.experiment_doc, keys::UNLABELLED_LEN, json!(len))
            });
        if let Err(e) = result {
            warn!(error = %e, "failed to record unlabelled_len");
            report.aggregate_failures.push(WriteFailure {
                key: keys::UNLABELLED_LEN.to_string(),
                reason: e.to_string(),
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use labelpool_core::{codec, sample_key};
    use labelpool_storage::{safe_read, UnlabelledPool};
    use labelpool_test_utils::fixtures::{self, TARGET_INDEX};
    use labelpool_test_utils::FailingPointStore;
    use std::sync::Arc;

    fn run(ctx: &StorageContext, dataset: &Dataset) -> LoadReport {
        let config = LabelPoolConfig::default();
        PoolPartitioner::new(ctx, &config)
            .run(dataset)
            .expect("partitioning should succeed")
    }

    #[test]
    fn test_next_batch_no() {
        assert_eq!(next_batch_no(&[]), 1);
        assert_eq!(next_batch_no(&fixtures::small_dataset().labels), 3);
    }

    #[test]
    fn test_pools_and_aggregates() {
        let ctx = StorageContext::in_memory();
        let report = run(&ctx, &fixtures::small_dataset());

        assert!(report.is_complete());
        assert_eq!(report.batch_no, 3);
        assert_eq!(report.train_count, 2);
        assert_eq!(report.test_count, 1);
        assert_eq!(report.unlabelled_count, 4);
        assert_eq!(report.rows_written, 4);
        assert_eq!(report.studies_written, 2);

        let points = ctx.points.as_ref();
        assert_eq!(safe_read::<i64>(points, keys::BATCH_NO), Some(3));
        assert_eq!(
            safe_read::<Vec<SampleIndex>>(points, keys::UNLABELLED_LIST),
            Some(vec![4, 5, 6, TARGET_INDEX])
        );
        assert_eq!(
            safe_read::<Vec<Value>>(points, keys::TRAIN_LIST),
            Some(vec![])
        );
        assert_eq!(
            safe_read::<Vec<Value>>(points, keys::ACC_LIST),
            Some(vec![])
        );

        let train: Vec<SampleRow> = safe_read(points, keys::TRAIN_DATA).unwrap();
        assert_eq!(train.len(), 2);
        assert_eq!(train[0].label.as_deref(), Some("tissue"));

        let unlabelled: Vec<SampleRow> = safe_read(points, keys::UNLABELLED_DATA).unwrap();
        assert!(unlabelled.iter().all(|row| row.attributes.is_empty()));
        assert!(unlabelled.iter().all(|row| row.key_value.is_some()));
    }

    #[test]
    fn test_aggregate_tables_use_table_encoding() {
        let ctx = StorageContext::in_memory();
        run(&ctx, &fixtures::small_dataset());
        let blob = ctx.points.get(keys::LABEL_DATA).unwrap().unwrap();
        assert_eq!(codec::encoding_of(&blob).unwrap(), codec::Encoding::Table);
    }

    #[test]
    fn test_unlabelled_rows_keyed_and_ordered() {
        let ctx = StorageContext::in_memory();
        run(&ctx, &fixtures::small_dataset());

        let row: SampleRow = safe_read(ctx.points.as_ref(), &sample_key(TARGET_INDEX)).unwrap();
        assert_eq!(row.sra_study_id.as_deref(), Some(fixtures::TARGET_STUDY));
        assert!(row.attributes.contains_key("feature_0"));

        let pool = UnlabelledPool::new(ctx.clone(), "data", "experiment");
        assert_eq!(pool.recorded_len().unwrap(), Some(4));
        assert_eq!(pool.item(0).unwrap().map(|r| r.index), Some(4));
        assert_eq!(pool.item(3).unwrap().map(|r| r.index), Some(TARGET_INDEX));

        // labeled rows never reach the point store under their index
        assert!(ctx.points.get(&sample_key(1)).unwrap().is_none());
    }

    #[test]
    fn test_studies_keyed_by_identifier() {
        let ctx = StorageContext::in_memory();
        run(&ctx, &fixtures::small_dataset());
        let study: Value = safe_read(ctx.points.as_ref(), fixtures::TARGET_STUDY).unwrap();
        assert_eq!(study["sra_study_id"], json!(fixtures::TARGET_STUDY));
    }

    #[test]
    fn test_malformed_fields_counted_but_rows_stored() {
        let ctx = StorageContext::in_memory();
        let report = run(&ctx, &fixtures::dataset_with_malformed_fields());
        assert_eq!(report.malformed_fields, 1);
        assert_eq!(report.rows_written, 4);
        assert!(ctx.points.get(&sample_key(5)).unwrap().is_some());
    }

    #[test]
    fn test_duplicate_label_rows_keep_first_pool() {
        let mut dataset = fixtures::small_dataset();
        dataset
            .labels
            .push(fixtures::label(TARGET_INDEX, PoolType::Train, Some("tissue"), None));

        let ctx = StorageContext::in_memory();
        let report = run(&ctx, &dataset);
        assert_eq!(report.duplicate_labels, 1);
        assert_eq!(report.train_count, 2);
        assert_eq!(report.unlabelled_count, 4);
    }

    #[test]
    fn test_row_failure_degraded() {
        let points = FailingPointStore::new().fail_writes_to(sample_key(TARGET_INDEX));
        let ctx = StorageContext::in_memory().with_points(Arc::new(points));

        let report = run(&ctx, &fixtures::small_dataset());
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.row_failures.len(), 1);
        assert_eq!(report.row_failures[0].key, "42");
        assert!(ctx.points.get("42").unwrap().is_none());
        // the rest of the load went ahead
        assert!(ctx.points.get(keys::LABEL_DATA).unwrap().is_some());
        assert!(report.enforce(LoadPolicy::Degraded).is_ok());
    }

    #[test]
    fn test_row_failure_strict() {
        let points = FailingPointStore::new().fail_writes_to(fixtures::TARGET_STUDY);
        let ctx = StorageContext::in_memory().with_points(Arc::new(points));

        let report = run(&ctx, &fixtures::small_dataset());
        assert_eq!(report.study_failures.len(), 1);
        let err = report.enforce(LoadPolicy::Strict).unwrap_err();
        assert!(err.to_string().contains("1 of"));
    }

    #[test]
    fn test_progress_every_zero_rejected() {
        let ctx = StorageContext::in_memory();
        let config = LabelPoolConfig {
            progress_every: 0,
            ..LabelPoolConfig::default()
        };
        assert!(PoolPartitioner::new(&ctx, &config)
            .run(&fixtures::small_dataset())
            .is_err());
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
