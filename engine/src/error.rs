use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Required file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("There are {count} invalid dates in the '{column}' column (rows {rows:?})")]
    InvalidDate {
        column: String,
        count: usize,
        /// 1-based data row positions, header excluded.
        rows: Vec<usize>,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Degenerate range in dimension {dimension} ('{name}'): min == max == {value}")]
    DegenerateRange {
        dimension: usize,
        name: String,
        value: f64,
    },

    #[error("Non-finite value {value} in dimension {dimension} ('{name}') at sample {sample}")]
    NonFiniteValue {
        dimension: usize,
        name: String,
        sample: usize,
        value: f64,
    },

    #[error("Scaler mismatch: {0}")]
    ScalerMismatch(String),

    #[error("Artifact not found: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("Shape error: expected {expected}, got {actual} ({context})")]
    Shape {
        expected: usize,
        actual: usize,
        context: String,
    },

    #[error("Insufficient data: {rows} rows, at least {required} required ({context})")]
    InsufficientData {
        rows: usize,
        required: usize,
        context: String,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn shape(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        EngineError::Shape { expected, actual, context: context.into() }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        EngineError::MissingColumn { column: column.into() }
    }
}
