//! Error types for labelpool operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Serialization codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encode failed: {reason}")]
    Encode { reason: String },

    #[error("Decode failed: {reason}")]
    Decode { reason: String },

    #[error("Unknown encoding tag: {tag:#04x}")]
    UnknownTag { tag: u8 },

    #[error("Blob truncated")]
    Truncated,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors raised by the pluggable learning algorithm.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("Algorithm {alg_label} failed to initialize: {reason}")]
    InitFailed { alg_label: String, reason: String },

    #[error("Algorithm {alg_label} failed to select a query: {reason}")]
    QueryFailed { alg_label: String, reason: String },

    #[error("Algorithm {alg_label} failed to process answer: {reason}")]
    UpdateFailed { alg_label: String, reason: String },

    #[error("Algorithm {alg_label} has no model available")]
    ModelUnavailable { alg_label: String },
}

/// Malformed string-literal structured field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed {field} at offset {offset}: {reason}")]
pub struct FieldError {
    pub field: String,
    pub offset: usize,
    pub reason: String,
}

/// Partitioning errors, raised only under the strict load policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Partial load: {failed} of {attempted} writes failed")]
    PartialLoad { attempted: usize, failed: usize },
}

/// Master error type for all labelpool errors.
#[derive(Debug, Clone, Error)]
pub enum LabelPoolError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Result type alias for labelpool operations.
pub type LabelPoolResult<T> = Result<T, LabelPoolError>;

// =============================================================================
// TESTS
// =============================================================================
