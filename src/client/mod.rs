//! Remote batch service client
//!
//! [`BatchService`] is the seam between the pipeline and the network: the
//! pipeline only ever talks to this trait, so tests can substitute a
//! scripted implementation and the HTTP client stays in one place.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::core::batch::{BatchJob, FileObject};
use crate::utils::error::Result;

/// Operations the pipeline consumes from the remote batch service
///
/// Every method maps to one opaque network call; the pipeline adds no
/// retries around them.
#[async_trait]
pub trait BatchService: Send + Sync {
    /// Upload a file for batch processing and return its handle
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<FileObject>;

    /// Create a batch job over a previously uploaded input file
    async fn create_batch(
        &self,
        input_file_id: &str,
        endpoint: &str,
        completion_window: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<BatchJob>;

    /// Fetch the current state of a batch job
    async fn retrieve_batch(&self, batch_id: &str) -> Result<BatchJob>;

    /// Ask the service to cancel a batch job
    async fn cancel_batch(&self, batch_id: &str) -> Result<BatchJob>;

    /// Download the raw content of a file (e.g. the job's result payload)
    async fn file_content(&self, file_id: &str) -> Result<Vec<u8>>;
}
