//! End-to-end batch pipeline
//!
//! Stages run strictly in sequence: load -> key/transform -> prompt ->
//! submit -> poll -> reconcile -> save. The keyed snapshot travels between
//! stages as a value, so concurrent runs never share intermediate state.

pub mod poll;
pub mod prompt;
pub mod reconcile;
pub mod submit;

use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::BatchService;
use crate::config::Config;
use crate::core::record::{apply_transforms, Record, Transform};
use crate::tabular::{self, OutputFormat};
use crate::utils::error::Result;

use poll::JobPoller;
use prompt::PromptBuilder;
use reconcile::Reconciler;

/// Per-run options, resolved from the CLI
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Input table path
    pub input: PathBuf,
    /// Output base path; the format's extension is appended
    pub output_base: PathBuf,
    /// Output serialization format
    pub format: OutputFormat,
    /// Prompt template override (falls back to the configured default)
    pub prompt_file: Option<PathBuf>,
    /// Record-count limit, 0 = unlimited
    pub limit: usize,
}

/// What a completed run did, for the final operator-facing summary
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Records loaded from the input file (after the limit)
    pub input_records: usize,
    /// Requests submitted to the batch service
    pub submitted: usize,
    /// Records skipped pre-submission for a blank source field
    pub skipped_empty: usize,
    /// Responses that failed structured parsing
    pub parse_failures: usize,
    /// Items the service flagged with a per-item error
    pub remote_item_errors: usize,
    /// Responses whose identity matched no known record
    pub missing_correlations: usize,
    /// Rows in the final deduplicated table
    pub output_rows: usize,
    /// Where the output was written
    pub output_path: PathBuf,
}

/// The batch pipeline, generic over the remote service for testability
pub struct Pipeline<S: BatchService> {
    service: S,
    config: Config,
    cancel: Option<watch::Receiver<bool>>,
}

impl<S: BatchService> Pipeline<S> {
    /// Create a pipeline over a remote service and configuration
    pub fn new(service: S, config: Config) -> Self {
        Self {
            service,
            config,
            cancel: None,
        }
    }

    /// Attach a cooperative cancellation signal for the polling stage
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the pipeline end to end
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        info!(input = %options.input.display(), "starting batch pipeline run");

        let records = tabular::load(&options.input)?;
        let records = apply_transforms(
            records,
            &[
                Transform::AssignIds,
                Transform::RemoveColumns(self.config.drop_columns.clone()),
                Transform::Limit(options.limit),
            ],
        );
        info!(records = records.len(), "input records keyed");

        let template_path = options
            .prompt_file
            .as_deref()
            .unwrap_or(&self.config.prompt_template);
        let builder = PromptBuilder::from_template_file(template_path, &self.config)?;
        let batch = builder.build(records)?;
        let input_records = batch.snapshot.len();
        let submitted = batch.items.len();
        let skipped_empty = batch.skipped.len();

        write_snapshot(&batch.snapshot)?;

        let reconciler = Reconciler::new(&self.config);
        let outcome = if batch.items.is_empty() {
            // Nothing to ask the model; pass the input through cleanup/dedup
            warn!("no prompts generated; writing input records through unchanged");
            reconciler.reconcile(&[], batch.snapshot)
        } else {
            let job = submit::submit(&self.service, &batch.items, &self.config).await?;

            let mut poller = JobPoller::new(&self.service, self.config.poll_interval());
            if let Some(cancel) = &self.cancel {
                poller = poller.with_cancellation(cancel.clone());
            }
            let job = poller.wait(job).await?;

            reconciler.run(&self.service, &job, batch.snapshot).await?
        };

        let output_path = tabular::save(&outcome.table, &options.output_base, options.format)?;

        let summary = RunSummary {
            input_records,
            submitted,
            skipped_empty,
            parse_failures: outcome.stats.parse_failures,
            remote_item_errors: outcome.stats.remote_item_errors,
            missing_correlations: outcome.stats.missing_correlations,
            output_rows: outcome.table.len(),
            output_path,
        };
        info!(
            records = summary.input_records,
            submitted = summary.submitted,
            skipped = summary.skipped_empty,
            parse_failures = summary.parse_failures,
            remote_item_errors = summary.remote_item_errors,
            missing_correlations = summary.missing_correlations,
            rows = summary.output_rows,
            output = %summary.output_path.display(),
            "pipeline run finished"
        );
        Ok(summary)
    }
}

/// Write the keyed snapshot to a per-run audit file
///
/// The reconciler consumes the snapshot as an in-memory value; this file
/// exists so operators can inspect exactly what was prompted. The unique
/// name keeps concurrent runs from clobbering each other.
fn write_snapshot(snapshot: &[Record]) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("promobatch-snapshot-{}.json", Uuid::new_v4()));
    write_snapshot_to(snapshot, &path)?;
    info!(path = %path.display(), "wrote keyed input snapshot");
    Ok(path)
}

fn write_snapshot_to(snapshot: &[Record], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}
