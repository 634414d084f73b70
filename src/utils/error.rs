//! Error handling for the pipeline
//!
//! One crate-level error enum. Fatal variants propagate to `main` and
//! terminate the run; per-item problems (remote-flagged items, malformed
//! response text, unresolvable correlation) are logged and counted where
//! they occur and never become a `PipelineError`.

use thiserror::Error;

use crate::core::batch::BatchStatus;

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet write errors
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Spreadsheet read errors
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Remote API returned a non-success status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// Unsupported output format selector
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Unsupported input file extension
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    /// Batch job reached a terminal state other than `completed`
    #[error("Batch job {id} ended in terminal status `{status}`")]
    JobFailed {
        /// Remote job id
        id: String,
        /// Terminal status the service reported
        status: BatchStatus,
    },

    /// Completed job carries no output file to fetch
    #[error("Batch job {0} completed without an output file")]
    MissingOutputFile(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}
