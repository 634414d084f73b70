//! Batch submission
//!
//! Serializes the requests as JSONL, uploads the file, and starts the job.
//! Any failure here is fatal for the run; submission is never retried
//! locally.

use tracing::info;

use crate::client::BatchService;
use crate::config::Config;
use crate::core::batch::{BatchItem, BatchJob};
use crate::utils::error::Result;

/// Filename given to the uploaded batch input file
const BATCH_INPUT_FILENAME: &str = "batch_inputs.jsonl";

/// Upload the requests as one JSONL file and create the batch job
pub async fn submit<S: BatchService + ?Sized>(
    service: &S,
    items: &[BatchItem],
    config: &Config,
) -> Result<BatchJob> {
    let payload = to_jsonl(items)?;
    let file = service
        .upload_file(BATCH_INPUT_FILENAME, payload.into_bytes())
        .await?;
    info!(file_id = %file.id, requests = items.len(), "uploaded batch input file");

    let job = service
        .create_batch(
            &file.id,
            &config.endpoint,
            &config.completion_window,
            &config.metadata,
        )
        .await?;
    info!(job_id = %job.id, status = %job.status, "batch job submitted");
    Ok(job)
}

fn to_jsonl(items: &[BatchItem]) -> Result<String> {
    let mut payload = String::new();
    for item in items {
        payload.push_str(&serde_json::to_string(item)?);
        payload.push('\n');
    }
    Ok(payload)
}
