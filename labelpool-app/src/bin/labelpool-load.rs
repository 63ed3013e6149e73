//! Dataset Loader Binary
//!
//! Partitions a dataset bundle into the configured storage backend and
//! prints the load report as JSON to stdout.
//!
//! Usage:
//!   labelpool-load <bundle.json>
//!
//! The bundle is a JSON object with `samples`, `labels`, and optional
//! `studies` arrays. Storage and partitioning settings come from the
//! `LABELPOOL_*` environment variables.

use labelpool_app::{init_tracing, PoolPartitioner, TelemetryConfig};
use labelpool_core::{Dataset, LabelPoolConfig, StorageConfig};
use labelpool_storage::StorageContext;

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_tracing(&TelemetryConfig::default()) {
        fail(format!("Failed to initialize tracing: {}", e));
    }

    let Some(path) = std::env::args().nth(1) else {
        fail("usage: labelpool-load <bundle.json>".to_string());
    };

    let config = LabelPoolConfig::from_env()
        .unwrap_or_else(|e| fail(format!("Invalid configuration: {}", e)));
    let storage_config = StorageConfig::from_env();

    let bytes = tokio::fs::read(&path)
        .await
        .unwrap_or_else(|e| fail(format!("Failed to read {}: {}", path, e)));
    let dataset: Dataset = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| fail(format!("Failed to parse {}: {}", path, e)));

    let ctx = StorageContext::from_config(&storage_config)
        .unwrap_or_else(|e| fail(format!("Failed to open storage: {}", e)));

    let report = PoolPartitioner::new(&ctx, &config)
        .run(&dataset)
        .unwrap_or_else(|e| fail(format!("Partitioning failed: {}", e)));

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("Failed to serialize load report: {}", e)),
    }

    if let Err(e) = report.enforce(config.load_policy) {
        fail(format!("{}", e));
    }
}
