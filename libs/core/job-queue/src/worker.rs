//! The generic worker loop
//!
//! This module provides:
//! - `JobProcessor` trait for domain handlers
//! - `QueueWorker` which leases jobs, drives processors, and reports
//!   outcomes back to the queue

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::job::{Job, JobState};
use crate::metrics::{self, JobStatus};
use crate::queue::JobQueue;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Trait for job processors
///
/// Domain handlers implement this to process jobs from a queue.
///
/// # Example
///
/// ```rust,ignore
/// struct NotificationProcessor { /* ... */ }
///
/// #[async_trait]
/// impl JobProcessor<NotificationIntent> for NotificationProcessor {
///     async fn process(&self, job: &Job<NotificationIntent>) -> Result<(), QueueError> {
///         self.handle(&job.payload).await.map_err(Into::into)
///     }
///
///     fn name(&self) -> &'static str {
///         "NotificationProcessor"
///     }
/// }
/// ```
#[async_trait]
pub trait JobProcessor<P>: Send + Sync
where
    P: Send + Sync,
{
    /// Process a single job.
    ///
    /// Return `Ok(())` for success, `Err` for failure. Failed jobs are
    /// retried or moved to the terminal failed state per their options;
    /// the worker never swallows an error to avoid a retry.
    async fn process(&self, job: &Job<P>) -> Result<(), QueueError>;

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;

    /// Health check for the processor.
    ///
    /// Override to check external collaborators (e.g. a mail relay).
    async fn health_check(&self) -> Result<bool, QueueError> {
        Ok(true)
    }
}

/// Generic worker that leases jobs from a queue and runs a processor
///
/// Each leased job follows the same per-slot machine: process, then ack
/// on success or report failure so the queue applies the job's retry
/// policy. Concurrency is N independent slots bounded by a semaphore;
/// by default jobs are processed sequentially.
pub struct QueueWorker<P, Proc>
where
    P: Serialize + DeserializeOwned + Clone + Send + Sync,
    Proc: JobProcessor<P>,
{
    queue: Arc<JobQueue<P>>,
    processor: Arc<Proc>,
    config: QueueConfig,
    concurrency_semaphore: Arc<Semaphore>,
}

impl<P, Proc> QueueWorker<P, Proc>
where
    P: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    Proc: JobProcessor<P> + 'static,
{
    /// Create a new worker
    pub fn new(queue: Arc<JobQueue<P>>, processor: Proc, config: QueueConfig) -> Self {
        Self::with_arc_processor(queue, Arc::new(processor), config)
    }

    /// Create a new worker sharing an existing processor
    pub fn with_arc_processor(
        queue: Arc<JobQueue<P>>,
        processor: Arc<Proc>,
        config: QueueConfig,
    ) -> Self {
        let concurrency_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            queue,
            processor,
            config,
            concurrency_semaphore,
        }
    }

    /// Get a reference to the queue
    pub fn queue(&self) -> &JobQueue<P> {
        &self.queue
    }

    /// Run the worker loop
    ///
    /// Continuously leases and processes jobs until the shutdown signal
    /// flips. In-flight jobs are drained before this returns.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        info!(
            consumer_id = %self.config.consumer_id,
            topic = %self.config.topic,
            processor = %self.processor.name(),
            batch_size = %self.config.batch_size,
            max_concurrent_jobs = %self.config.max_concurrent_jobs,
            poll_interval_ms = %self.config.poll_interval_ms,
            "Starting queue worker"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        // Track consecutive errors for exponential backoff
        let mut consecutive_errors: u32 = 0;
        const MAX_BACKOFF_SECS: u64 = 30;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            match self.queue.lease(self.config.batch_size).await {
                Ok(jobs) if jobs.is_empty() => {
                    if consecutive_errors > 0 {
                        info!("Connection recovered after {} errors", consecutive_errors);
                        consecutive_errors = 0;
                    }

                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                info!("Received shutdown signal, stopping worker");
                                break;
                            }
                        }
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Ok(jobs) => {
                    if consecutive_errors > 0 {
                        info!("Connection recovered after {} errors", consecutive_errors);
                        consecutive_errors = 0;
                    }

                    metrics::record_batch_size(&self.config.topic, jobs.len());

                    if self.config.max_concurrent_jobs <= 1 {
                        for job in &jobs {
                            Self::process_job(&self.queue, &self.processor, &self.config.topic, job)
                                .await;
                        }
                    } else {
                        self.process_jobs_concurrent(jobs).await;
                    }
                }
                Err(QueueError::Closed) => {
                    info!("Queue closed, stopping worker");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;

                    if e.is_connection_error() {
                        let backoff_secs =
                            std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                        warn!(
                            error = %e,
                            consecutive_errors = %consecutive_errors,
                            backoff_secs = %backoff_secs,
                            "Redis connection error, backing off"
                        );
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    } else {
                        error!(error = %e, "Error leasing jobs");
                    }

                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Queue worker stopped");
        Ok(())
    }

    /// Process jobs concurrently, bounded by the semaphore
    async fn process_jobs_concurrent(&self, jobs: Vec<Job<P>>) {
        let mut join_set: JoinSet<()> = JoinSet::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        for job in jobs {
            let semaphore = Arc::clone(&self.concurrency_semaphore);
            let processor = Arc::clone(&self.processor);
            let queue = Arc::clone(&self.queue);
            let topic = self.config.topic.clone();
            let in_flight = Arc::clone(&in_flight);

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };

                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::set_in_flight_jobs(&topic, current as f64);

                Self::process_job(&queue, &processor, &topic, &job).await;

                let current = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                metrics::set_in_flight_jobs(&topic, current as f64);
            });
        }

        // Wait for all jobs to complete
        while join_set.join_next().await.is_some() {}
    }

    /// Drive one job through the slot machine: process, then ack or fail
    async fn process_job(queue: &JobQueue<P>, processor: &Proc, topic: &str, job: &Job<P>) {
        debug!(
            job_id = %job.id,
            attempts_made = %job.attempts_made,
            "Processing job"
        );

        let start = std::time::Instant::now();

        match processor.process(job).await {
            Ok(()) => {
                metrics::record_job_processed(topic, JobStatus::Success);
                metrics::record_job_duration(topic, start.elapsed());

                if let Err(e) = queue.ack(job).await {
                    error!(job_id = %job.id, error = %e, "Failed to ack job");
                }
            }
            Err(e) => {
                metrics::record_job_processed(topic, JobStatus::Failed);

                warn!(
                    job_id = %job.id,
                    error = %e,
                    "Job processing failed"
                );

                match queue.fail(job, &e.to_string()).await {
                    Ok(JobState::Delayed) => metrics::record_retry(topic),
                    Ok(_) => {}
                    Err(fail_err) => {
                        error!(
                            job_id = %job.id,
                            error = %fail_err,
                            "Failed to report job failure"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestPayload {
        data: String,
    }

    struct NoopProcessor;

    #[async_trait]
    impl JobProcessor<TestPayload> for NoopProcessor {
        async fn process(&self, _job: &Job<TestPayload>) -> Result<(), QueueError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "NoopProcessor"
        }
    }

    #[tokio::test]
    async fn test_default_health_check() {
        let processor = NoopProcessor;
        assert!(processor.health_check().await.unwrap());
    }
}
