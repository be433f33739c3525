//! Error types for risk scoring, import and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("row {row}: cannot parse {field} value {value:?} as a number")]
    InvalidCell {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("row {row}: no value for {field}")]
    MissingField { row: usize, field: &'static str },

    #[error("import text has no header line")]
    EmptyInput,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RiskError>;
