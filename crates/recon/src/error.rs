use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty name, duplicate column, bad top_n, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Missing required column in a source table.
    #[error("source '{source_name}': missing column '{column}'")]
    MissingColumn { source_name: String, column: String },
    /// Candidate columns handed to the resolver differ in length.
    #[error("candidate column {index} has {actual} rows, expected {expected}")]
    ColumnLengthMismatch { index: usize, expected: usize, actual: usize },
    /// JSON document is neither an array of records nor an object of records.
    #[error("source '{source_name}': unsupported JSON structure ({found})")]
    UnsupportedJson { source_name: String, found: String },
    /// CSV / JSON decoding error.
    #[error("source '{source_name}': {message}")]
    Decode { source_name: String, message: String },
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
    /// Nothing left to compute on after filtering.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

/// Why a contingency table could not be tested.
///
/// Serialized into the run result so a degenerate table never aborts the
/// rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InsufficientData {
    #[error("no rows with both dimensions present")]
    NoObservations,
    #[error("need at least 2 row categories, found {found}")]
    TooFewRows { found: usize },
    #[error("need at least 2 column categories, found {found}")]
    TooFewColumns { found: usize },
    #[error("zero marginal total in {axis} '{category}'")]
    ZeroMarginal { axis: String, category: String },
}
