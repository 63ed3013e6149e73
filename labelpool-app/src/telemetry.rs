//! Tracing subscriber initialization.

use labelpool_core::{ConfigError, LabelPoolError, LabelPoolResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "labelpool_app=info,labelpool_storage=warn,warn";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `LABELPOOL_LOG_FORMAT`: `json` or `pretty` (default)
    pub format: LogFormat,
    /// Filter directives; `RUST_LOG` when set
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: match std::env::var("LABELPOOL_LOG_FORMAT") {
                Ok(s) if s.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails because a global
/// subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> LabelPoolResult<()> {
    let env_filter = EnvFilter::try_new(&config.filter).map_err(|e| {
        LabelPoolError::Config(ConfigError::InvalidValue {
            field: "RUST_LOG".to_string(),
            value: config.filter.clone(),
            reason: e.to_string(),
        })
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| {
        LabelPoolError::Config(ConfigError::InvalidValue {
            field: "tracing".to_string(),
            value: format!("{:?}", config.format),
            reason: format!("Failed to init subscriber: {}", e),
        })
    })?;

    tracing::info!(format = ?config.format, filter = %config.filter, "Telemetry initialized");
    Ok(())
}
