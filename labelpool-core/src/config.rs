//! Configuration types

use crate::error::{ConfigError, LabelPoolError, LabelPoolResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// What the partitioner does when individual row writes fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Keep going; missing rows are reported but initialization succeeds
    Degraded,
    /// Finish the load, then fail initialization if anything was dropped
    Strict,
}

impl FromStr for LoadPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degraded" => Ok(LoadPolicy::Degraded),
            "strict" => Ok(LoadPolicy::Strict),
            other => Err(ConfigError::InvalidValue {
                field: "load_policy".to_string(),
                value: other.to_string(),
                reason: "expected 'degraded' or 'strict'".to_string(),
            }),
        }
    }
}

/// Master configuration for the serving core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPoolConfig {
    /// Ordered-list key the unlabeled rows are pushed onto
    pub data_list_key: String,
    /// Emit a progress marker every this many unlabeled rows
    pub progress_every: usize,
    /// Partial-load handling during partitioning
    pub load_policy: LoadPolicy,
    /// Document-store name holding answer counters and `unlabelled_len`
    pub experiment_doc: String,
}

impl Default for LabelPoolConfig {
    fn default() -> Self {
        Self {
            data_list_key: "data".to_string(),
            progress_every: 10_000,
            load_policy: LoadPolicy::Degraded,
            experiment_doc: "experiment".to_string(),
        }
    }
}

impl LabelPoolConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LABELPOOL_DATA_LIST_KEY`: ordered-list key (default: "data")
    /// - `LABELPOOL_PROGRESS_EVERY`: progress marker cadence (default: 10000)
    /// - `LABELPOOL_LOAD_POLICY`: "degraded" or "strict" (default: degraded)
    /// - `LABELPOOL_EXPERIMENT_DOC`: counter document name (default: "experiment")
    ///
    /// An unparseable load policy is an error rather than a silent default.
    pub fn from_env() -> LabelPoolResult<Self> {
        let defaults = Self::default();

        let load_policy = match std::env::var("LABELPOOL_LOAD_POLICY") {
            Ok(raw) => raw.parse::<LoadPolicy>()?,
            Err(_) => defaults.load_policy,
        };

        Ok(Self {
            data_list_key: std::env::var("LABELPOOL_DATA_LIST_KEY")
                .unwrap_or(defaults.data_list_key),
            progress_every: std::env::var("LABELPOOL_PROGRESS_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.progress_every),
            load_policy,
            experiment_doc: std::env::var("LABELPOOL_EXPERIMENT_DOC")
                .unwrap_or(defaults.experiment_doc),
        })
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - data_list_key and experiment_doc are non-empty
    /// - progress_every > 0
    pub fn validate(&self) -> LabelPoolResult<()> {
        if self.data_list_key.trim().is_empty() {
            return Err(LabelPoolError::Config(ConfigError::InvalidValue {
                field: "data_list_key".to_string(),
                value: self.data_list_key.clone(),
                reason: "data_list_key must not be empty".to_string(),
            }));
        }

        if self.progress_every == 0 {
            return Err(LabelPoolError::Config(ConfigError::InvalidValue {
                field: "progress_every".to_string(),
                value: self.progress_every.to_string(),
                reason: "progress_every must be greater than 0".to_string(),
            }));
        }

        if self.experiment_doc.trim().is_empty() {
            return Err(LabelPoolError::Config(ConfigError::InvalidValue {
                field: "experiment_doc".to_string(),
                value: self.experiment_doc.clone(),
                reason: "experiment_doc must not be empty".to_string(),
            }));
        }

        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the LMDB environment; `None` selects the in-memory backend
    pub lmdb_path: Option<PathBuf>,
    /// LMDB map size in megabytes
    pub max_size_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lmdb_path: None,
            max_size_mb: 1024,
        }
    }
}

impl StorageConfig {
    /// Create from environment variables.
    ///
    /// - `LABELPOOL_LMDB_PATH`: LMDB directory (unset = in-memory)
    /// - `LABELPOOL_LMDB_MAX_SIZE_MB`: map size (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lmdb_path: std::env::var("LABELPOOL_LMDB_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            max_size_mb: std::env::var("LABELPOOL_LMDB_MAX_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size_mb),
        }
    }

    pub fn validate(&self) -> LabelPoolResult<()> {
        if self.max_size_mb == 0 {
            return Err(LabelPoolError::Config(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "max_size_mb must be greater than 0".to_string(),
            }));
        }
        if self.max_size_mb.checked_mul(1024 * 1024).is_none() {
            return Err(LabelPoolError::Config(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "max_size_mb overflows the addressable map size".to_string(),
            }));
        }
        Ok(())
    }
}
