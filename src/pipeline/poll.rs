//! Job polling state machine
//!
//! Observes a submitted job until it reaches a terminal state. Only
//! `completed` is success; `failed`, `expired`, and `cancelled` surface as
//! [`PipelineError::JobFailed`]. The poller waits the configured interval
//! between observations and never busy-loops.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::BatchService;
use crate::core::batch::{BatchJob, BatchStatus};
use crate::utils::error::{PipelineError, Result};

/// Polls a batch job to completion
pub struct JobPoller<'a, S: BatchService + ?Sized> {
    service: &'a S,
    interval: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, S: BatchService + ?Sized> JobPoller<'a, S> {
    /// Create a poller with the given wait between observations
    pub fn new(service: &'a S, interval: Duration) -> Self {
        Self {
            service,
            interval,
            cancel: None,
        }
    }

    /// Attach a cooperative cancellation signal
    ///
    /// When the flag flips to `true` between observations, the poller asks
    /// the service to cancel the job once and then keeps observing until
    /// the service reports `cancelled`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Drive the job to a terminal state
    ///
    /// The job passed in counts as the first observation, so a job that was
    /// already `completed` at submission returns without any remote call.
    pub async fn wait(&self, job: BatchJob) -> Result<BatchJob> {
        let mut job = job;
        let mut cancel_requested = false;

        loop {
            match job.status {
                BatchStatus::Completed => {
                    info!(job_id = %job.id, "batch job completed");
                    return Ok(job);
                }
                status if status.is_terminal() => {
                    return Err(PipelineError::JobFailed { id: job.id, status });
                }
                status => {
                    info!(
                        job_id = %job.id,
                        status = %status,
                        completed = job.request_counts.completed,
                        total = job.request_counts.total,
                        "batch job in flight"
                    );
                }
            }

            if !cancel_requested && self.cancel_signalled() {
                warn!(job_id = %job.id, "cancellation requested; cancelling the remote job");
                job = self.service.cancel_batch(&job.id).await?;
                cancel_requested = true;
                continue;
            }

            tokio::time::sleep(self.interval).await;
            job = self.service.retrieve_batch(&job.id).await?;
        }
    }

    fn cancel_signalled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
