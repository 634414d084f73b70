//! Batch job wire types
//!
//! These mirror the OpenAI Batch API JSON shapes: one [`BatchItem`] per
//! JSONL line of the input file, one [`BatchItemResult`] per JSONL line of
//! the output file, and [`BatchJob`] for the job object itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch job status as reported by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Input file is being validated
    Validating,
    /// Validation or processing failed
    Failed,
    /// Requests are being executed
    InProgress,
    /// Results are being assembled
    Finalizing,
    /// All done, output file available
    Completed,
    /// Completion window elapsed before the job finished
    Expired,
    /// Cancellation requested, still winding down
    Cancelling,
    /// Job was cancelled
    Cancelled,
}

impl BatchStatus {
    /// Whether no further status transition will occur
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Expired
                | BatchStatus::Cancelled
        )
    }

    /// Wire-format name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Validating => "validating",
            BatchStatus::Failed => "failed",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Completed => "completed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelling => "cancelling",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counts for a batch job
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RequestCounts {
    /// Total requests in the batch
    #[serde(default)]
    pub total: i64,
    /// Requests completed so far
    #[serde(default)]
    pub completed: i64,
    /// Requests that failed
    #[serde(default)]
    pub failed: i64,
}

/// A batch job as seen through the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// Remote job id
    pub id: String,
    /// Current status
    pub status: BatchStatus,
    /// Endpoint the batch targets
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Id of the uploaded input file
    #[serde(default)]
    pub input_file_id: Option<String>,
    /// Id of the result file, present once completed
    #[serde(default)]
    pub output_file_id: Option<String>,
    /// Id of the per-item error file, if any
    #[serde(default)]
    pub error_file_id: Option<String>,
    /// Completion window the job was created with
    #[serde(default)]
    pub completion_window: Option<String>,
    /// Progress counters
    #[serde(default)]
    pub request_counts: RequestCounts,
    /// Creation timestamp
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    /// Completion timestamp
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One request line of the batch input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Correlation token, unique within the batch
    pub custom_id: String,
    /// HTTP method (always POST here)
    pub method: String,
    /// Target endpoint path
    pub url: String,
    /// Request body
    pub body: serde_json::Value,
}

/// One response line of the batch output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Correlation token of the originating request
    pub custom_id: String,
    /// HTTP response, absent when the item errored
    #[serde(default)]
    pub response: Option<ItemResponse>,
    /// Per-item error reported by the service
    #[serde(default)]
    pub error: Option<ItemError>,
}

/// HTTP response for one batch item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    /// HTTP status code
    #[serde(default)]
    pub status_code: u16,
    /// Chat completion body
    pub body: serde_json::Value,
}

/// Per-item error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
}

/// An uploaded file handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileObject {
    /// Remote file id
    pub id: String,
    /// Original filename
    #[serde(default)]
    pub filename: Option<String>,
    /// Upload purpose
    #[serde(default)]
    pub purpose: Option<String>,
    /// File size in bytes
    #[serde(default)]
    pub bytes: Option<u64>,
}
