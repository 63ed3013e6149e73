//! labelpool App - Host Entry Points
//!
//! The four callbacks a host experimentation runtime invokes:
//!
//! - [`init_exp`]: partition a dataset into pools and initialize the algorithm
//! - [`get_query`]: serve the algorithm's chosen sample, enriched
//! - [`process_answer`]: record a participant's label
//! - [`get_model`]: pass through the algorithm's model snapshot
//!
//! All shared state lives in the [`StorageContext`]; nothing is held
//! between calls, so concurrent requests need no in-process locking.

pub mod answer;
pub mod model;
pub mod partition;
pub mod query;
pub mod telemetry;

pub use answer::record_answer;
pub use model::model_snapshot;
pub use partition::{next_batch_no, LoadReport, PoolPartitioner, WriteFailure};
pub use query::{enrich, serve_query};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

use labelpool_core::{
    AlgorithmInit, ConfigError, Dataset, GetQueryArgs, InitArgs, LabelPoolConfig, LabelPoolError,
    LabelPoolResult, LabeledAnswer, LearningAlgorithm, ProcessAnswerArgs, QueryPayload, Reply,
};
use labelpool_storage::StorageContext;
use serde::Serialize;
use serde_json::Value;

/// Result of experiment initialization.
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    /// The caller's arguments with `n` filled in
    pub args: InitArgs,
    pub report: LoadReport,
}

fn validate_init_args(args: &InitArgs) -> LabelPoolResult<()> {
    let p = args.failure_probability;
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(LabelPoolError::Config(ConfigError::InvalidValue {
            field: "failure_probability".to_string(),
            value: p.to_string(),
            reason: "failure_probability must be within [0, 1]".to_string(),
        }));
    }
    if args.d < 0 {
        return Err(LabelPoolError::Config(ConfigError::InvalidValue {
            field: "d".to_string(),
            value: args.d.to_string(),
            reason: "d must not be negative".to_string(),
        }));
    }
    Ok(())
}

/// Partition `dataset` into storage and initialize `alg`.
///
/// Arguments are validated before anything is written. Under the strict
/// load policy a partial load fails here, after the load has run and
/// before the algorithm is initialized.
pub async fn init_exp(
    ctx: &StorageContext,
    alg: &dyn LearningAlgorithm,
    mut args: InitArgs,
    dataset: &Dataset,
    config: &LabelPoolConfig,
) -> LabelPoolResult<InitOutcome> {
    validate_init_args(&args)?;
    let n = args.targets.targetset.len();
    args.n = Some(n);

    tracing::info!(
        alg_label = alg.alg_label(),
        n,
        samples = dataset.samples.len(),
        labels = dataset.labels.len(),
        studies = dataset.studies.len(),
        "initializing experiment"
    );

    let report = PoolPartitioner::new(ctx, config).run(dataset)?;
    if !report.is_complete() {
        tracing::warn!(
            failed = report.failed_writes(),
            policy = ?config.load_policy,
            "partitioning left some writes unstored"
        );
    }
    report.enforce(config.load_policy)?;

    alg.initialize(&AlgorithmInit {
        n,
        failure_probability: args.failure_probability,
        d: args.d,
    })
    .await?;

    Ok(InitOutcome { args, report })
}

/// Serve the next query for a participant, or `{}`.
pub async fn get_query(
    ctx: &StorageContext,
    alg: &dyn LearningAlgorithm,
    args: &GetQueryArgs,
) -> Reply<QueryPayload> {
    serve_query(ctx, alg, &args.participant_uid).await
}

/// Record an answer, returning `{target_index, target_label}` or `{}`.
pub async fn process_answer(
    ctx: &StorageContext,
    alg: &dyn LearningAlgorithm,
    args: &ProcessAnswerArgs,
    config: &LabelPoolConfig,
) -> Reply<LabeledAnswer> {
    record_answer(ctx, alg, args, config).await
}

/// The algorithm's current model snapshot, or `{}`.
pub async fn get_model(alg: &dyn LearningAlgorithm) -> Reply<Value> {
    model_snapshot(alg).await
}
