//! Error types for Equidad

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid bin edges: {0}")]
    InvalidBins(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Zero outcome rate in {context}; set rho > 0 to floor the log ratio")]
    ZeroOutcomeRate { context: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
