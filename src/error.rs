//! Error types for the power trace analyzer.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, segmenting or reporting a trace.
///
/// Window sizes that do not fit the signal are not errors: they are clamped
/// and reported as [`crate::core::WindowAdjustment`]s. Missing table data is
/// not an error either; it renders as an empty cell.
#[derive(Error, Debug)]
pub enum Error {
    /// Required column missing, unparsable value or zero-length input.
    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    /// Two per-sample sequences that must line up do not.
    #[error("length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A segmentation or report parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be located or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error concerns the input data of a single scenario, as
    /// opposed to the environment (files, configuration).
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedTrace(_) | Error::LengthMismatch { .. } | Error::InvalidParameter(_)
        )
    }
}
