//! Bulk deletion
//!
//! Deletes a batch of heterogeneous resources with bounded parallelism.
//! A fixed pool of worker tasks performs the API calls; a single control loop
//! owns the work queue, hands jobs to idle workers, and re-queues failed
//! deletions after a fixed delay. By default a resource is retried until it
//! is gone.

use crate::api::{format_api_error, ApiError, ResourceApi};
use crate::progress::{ProgressSink, ProgressStatus, ProgressUpdate};
use crate::resource::Resource;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum PurgeError {
    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Max attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("{} resources could not be deleted", failed.len())]
    Incomplete { failed: Vec<Resource> },

    #[error("A deletion worker stopped unexpectedly")]
    WorkerLost,
}

/// Tuning for one purge run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOptions {
    /// Maximum number of deletions in flight
    pub concurrency: usize,
    /// Pause before a failed resource is queued again
    pub retry_delay: Duration,
    /// Give up on a resource after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_attempts: None,
        }
    }
}

/// Outcome of one deletion attempt, sent from a worker to the control loop
#[derive(Debug)]
pub struct DeleteResult {
    pub worker: usize,
    pub resource: Resource,
    pub attempt: u32,
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteSummary {
    pub deleted: usize,
    /// Deletion calls made, retries included
    pub attempts: u32,
    pub retries: u32,
}

struct Job {
    resource: Resource,
    attempt: u32,
}

/// Deletes resources through a [`ResourceApi`], reporting to a [`ProgressSink`]
pub struct BulkDeleter {
    api: Arc<dyn ResourceApi>,
    progress: Arc<dyn ProgressSink>,
    options: PurgeOptions,
}

impl BulkDeleter {
    pub fn new(api: Arc<dyn ResourceApi>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            api,
            progress,
            options: PurgeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PurgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Delete every resource, retrying failures until each one is gone
    ///
    /// Returns once every resource is deleted, or, when `max_attempts` is
    /// set, once the remaining ones have used up their attempts.
    pub async fn delete_all(&self, resources: Vec<Resource>) -> Result<DeleteSummary, PurgeError> {
        if self.options.concurrency == 0 {
            return Err(PurgeError::InvalidConcurrency);
        }
        if self.options.max_attempts == Some(0) {
            return Err(PurgeError::InvalidMaxAttempts);
        }

        let total = resources.len();
        let mut summary = DeleteSummary::default();
        if total == 0 {
            return Ok(summary);
        }

        let workers = self.options.concurrency.min(total);
        tracing::info!("Deleting {} resources with {} workers", total, workers);

        let (result_tx, mut results) = mpsc::channel::<DeleteResult>(workers);
        let mut job_senders = Vec::with_capacity(workers);
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let (job_tx, job_rx) = mpsc::channel::<Job>(1);
            job_senders.push(job_tx);
            pool.spawn(run_worker(
                worker,
                Arc::clone(&self.api),
                job_rx,
                result_tx.clone(),
            ));
        }
        drop(result_tx);

        let mut queue: VecDeque<Job> = resources
            .into_iter()
            .map(|resource| Job {
                resource,
                attempt: 1,
            })
            .collect();
        let mut idle: Vec<usize> = (0..workers).rev().collect();
        let mut waiting = FuturesUnordered::new();
        let mut failed: Vec<Resource> = Vec::new();

        while summary.deleted + failed.len() < total {
            while !queue.is_empty() {
                let Some(worker) = idle.pop() else { break };
                let Some(job) = queue.pop_front() else { break };

                self.progress.push_update(ProgressUpdate::new(
                    job.resource.key(),
                    format!("Deleting {} {}", job.resource.kind, job.resource.name),
                    ProgressStatus::Started,
                ));
                summary.attempts += 1;

                job_senders[worker]
                    .send(job)
                    .await
                    .map_err(|_| PurgeError::WorkerLost)?;
            }

            tokio::select! {
                Some(result) = results.recv() => {
                    idle.push(result.worker);
                    let DeleteResult { resource, attempt, error, .. } = result;

                    let Some(err) = error else {
                        summary.deleted += 1;
                        self.progress.push_success(resource.key());
                        continue;
                    };

                    if self.options.max_attempts.is_some_and(|max| attempt >= max) {
                        tracing::error!(
                            "Giving up on {} {} after {} attempts: {}",
                            resource.kind, resource.key(), attempt, err
                        );
                        self.progress.push_update(ProgressUpdate::new(
                            resource.key(),
                            format!(
                                "Failed to delete {} {}: {}",
                                resource.kind,
                                resource.name,
                                format_api_error(&err)
                            ),
                            ProgressStatus::Error,
                        ));
                        failed.push(resource);
                        continue;
                    }

                    tracing::warn!("Failed to delete {} {}: {}", resource.kind, resource.key(), err);
                    self.progress.push_update(ProgressUpdate::new(
                        resource.key(),
                        format!(
                            "Waiting {} seconds before retrying to delete {} {}",
                            self.options.retry_delay.as_secs(),
                            resource.kind,
                            resource.name
                        ),
                        ProgressStatus::None,
                    ));
                    summary.retries += 1;

                    let delay = self.options.retry_delay;
                    waiting.push(async move {
                        tokio::time::sleep(delay).await;
                        Job { resource, attempt: attempt + 1 }
                    });
                }
                Some(job) = waiting.next(), if !waiting.is_empty() => {
                    queue.push_back(job);
                }
                // Workers only return once their job channel closes, so any exit here is a loss
                Some(joined) = pool.join_next() => {
                    match joined {
                        Err(e) => tracing::error!("Deletion worker failed: {}", e),
                        Ok(()) => tracing::error!("Deletion worker stopped early"),
                    }
                    return Err(PurgeError::WorkerLost);
                }
                else => return Err(PurgeError::WorkerLost),
            }
        }

        drop(job_senders);
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Deletion worker ended abnormally: {}", e);
            }
        }

        tracing::info!(
            "Deleted {} resources in {} attempts ({} retries)",
            summary.deleted,
            summary.attempts,
            summary.retries
        );

        if failed.is_empty() {
            Ok(summary)
        } else {
            Err(PurgeError::Incomplete { failed })
        }
    }
}

/// Delete with default options
pub async fn delete_all(
    api: Arc<dyn ResourceApi>,
    progress: Arc<dyn ProgressSink>,
    resources: Vec<Resource>,
    concurrency: usize,
) -> Result<DeleteSummary, PurgeError> {
    BulkDeleter::new(api, progress)
        .with_options(PurgeOptions {
            concurrency,
            ..PurgeOptions::default()
        })
        .delete_all(resources)
        .await
}

async fn run_worker(
    worker: usize,
    api: Arc<dyn ResourceApi>,
    mut jobs: mpsc::Receiver<Job>,
    results: mpsc::Sender<DeleteResult>,
) {
    while let Some(job) = jobs.recv().await {
        let error = api.delete(&job.resource).await.err();
        let result = DeleteResult {
            worker,
            resource: job.resource,
            attempt: job.attempt,
            error,
        };
        if results.send(result).await.is_err() {
            break;
        }
    }
}
