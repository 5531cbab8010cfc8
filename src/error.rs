//! Error types for the ranker tuner.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RankTunerError>;

/// Errors that can occur while recording judgments, evaluating or tuning rankers.
#[derive(Error, Debug)]
pub enum RankTunerError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error while encoding a record.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A persisted record exists but does not hold a valid structure.
    #[error("Corrupt persisted state in '{path}': {reason}")]
    CorruptPersistedState { path: PathBuf, reason: String },

    /// Required input data (queries, judgments) is missing or empty.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A query number that the relevance store does not contain.
    #[error("Query {query_number} does not exist for evaluator '{evaluator}'")]
    UnknownQuery { evaluator: String, query_number: u32 },

    /// Invalid configuration or invalid operation arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A date string that could not be parsed.
    #[error("Invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },
}

impl RankTunerError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt-state error with path context.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptPersistedState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
