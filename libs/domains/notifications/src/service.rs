//! Producer facade over the notifications queue.
//!
//! A thin, stateless service wrapping the queue under its fixed topic.
//! Request handlers and internal events call this to submit intents and
//! observe queue health; they never see the worker. Every queue failure
//! propagates unchanged, except the health check which converts it into
//! a structured unhealthy result.

use crate::models::NotificationIntent;
use crate::topic::JOB_NAME;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_queue::{Job, JobOptions, JobQueue, JobState, QueueError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info};

/// Default max age for `clean_old_jobs` (24 hours).
pub const DEFAULT_CLEAN_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// Default removal cap for `clean_old_jobs`.
pub const DEFAULT_CLEAN_LIMIT: usize = 100;

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

/// Structured health report for the notifications queue.
///
/// Never raises: a failing backend yields `is_healthy: false` with the
/// error message instead of an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHealth {
    pub is_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<QueueStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The queue interface the producer facade depends on.
///
/// Implemented by `JobQueue<NotificationIntent>`; mockable for tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Submit one intent as a job.
    async fn submit(
        &self,
        intent: NotificationIntent,
        opts: JobOptions,
    ) -> Result<Job<NotificationIntent>, QueueError>;

    /// Submit a batch of intents with default options.
    async fn submit_many(
        &self,
        intents: Vec<NotificationIntent>,
    ) -> Result<Vec<Job<NotificationIntent>>, QueueError>;

    /// Point-in-time counts for the given states.
    async fn counts(&self, states: Vec<JobState>) -> Result<HashMap<JobState, u64>, QueueError>;

    async fn pause(&self) -> Result<(), QueueError>;

    async fn resume(&self) -> Result<(), QueueError>;

    async fn is_paused(&self) -> Result<bool, QueueError>;

    /// Remove terminal jobs older than `max_age_ms`, up to `limit`.
    async fn clean(
        &self,
        max_age_ms: u64,
        limit: usize,
        state: JobState,
    ) -> Result<Vec<u64>, QueueError>;

    async fn close(&self) -> Result<(), QueueError>;
}

#[async_trait]
impl NotificationQueue for JobQueue<NotificationIntent> {
    async fn submit(
        &self,
        intent: NotificationIntent,
        opts: JobOptions,
    ) -> Result<Job<NotificationIntent>, QueueError> {
        JobQueue::enqueue(self, JOB_NAME, intent, opts).await
    }

    async fn submit_many(
        &self,
        intents: Vec<NotificationIntent>,
    ) -> Result<Vec<Job<NotificationIntent>>, QueueError> {
        let items = intents
            .into_iter()
            .map(|intent| (JOB_NAME.to_string(), intent))
            .collect();
        JobQueue::enqueue_bulk(self, items).await
    }

    async fn counts(&self, states: Vec<JobState>) -> Result<HashMap<JobState, u64>, QueueError> {
        JobQueue::counts(self, &states).await
    }

    async fn pause(&self) -> Result<(), QueueError> {
        JobQueue::pause(self).await
    }

    async fn resume(&self) -> Result<(), QueueError> {
        JobQueue::resume(self).await
    }

    async fn is_paused(&self) -> Result<bool, QueueError> {
        JobQueue::is_paused(self).await
    }

    async fn clean(
        &self,
        max_age_ms: u64,
        limit: usize,
        state: JobState,
    ) -> Result<Vec<u64>, QueueError> {
        JobQueue::clean(self, max_age_ms, limit, state).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        JobQueue::close(self).await
    }
}

/// Service for submitting notifications and managing their queue.
pub struct NotificationQueueService<Q> {
    queue: Q,
}

impl<Q: NotificationQueue> NotificationQueueService<Q> {
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }

    /// Add a notification to the queue.
    ///
    /// Returns the job handle immediately; the outcome is observed via
    /// `get_queue_stats`/`get_queue_health`, never synchronously.
    pub async fn add_notification(
        &self,
        intent: NotificationIntent,
        opts: JobOptions,
    ) -> Result<Job<NotificationIntent>, QueueError> {
        let user_id = intent.user_id.clone();
        let kind = intent.kind;

        match self.queue.submit(intent, opts).await {
            Ok(job) => {
                info!(
                    job_id = %job.id,
                    user_id = %user_id,
                    kind = %kind,
                    "Notification added to queue"
                );
                Ok(job)
            }
            Err(e) => {
                error!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to add notification to queue"
                );
                Err(e)
            }
        }
    }

    /// Add multiple notifications in bulk.
    ///
    /// The batch is a single failure unit; partial submission is not
    /// surfaced.
    pub async fn add_bulk_notifications(
        &self,
        intents: Vec<NotificationIntent>,
    ) -> Result<Vec<Job<NotificationIntent>>, QueueError> {
        match self.queue.submit_many(intents).await {
            Ok(jobs) => {
                info!(count = jobs.len(), "Bulk notifications added to queue");
                Ok(jobs)
            }
            Err(e) => {
                error!(error = %e, "Failed to add bulk notifications to queue");
                Err(e)
            }
        }
    }

    /// Get queue statistics.
    pub async fn get_queue_stats(&self) -> Result<QueueStats, QueueError> {
        let counts = self
            .queue
            .counts(vec![
                JobState::Waiting,
                JobState::Active,
                JobState::Completed,
                JobState::Failed,
                JobState::Delayed,
            ])
            .await?;

        let count = |state: JobState| counts.get(&state).copied().unwrap_or(0);

        Ok(QueueStats {
            waiting: count(JobState::Waiting),
            active: count(JobState::Active),
            completed: count(JobState::Completed),
            failed: count(JobState::Failed),
            delayed: count(JobState::Delayed),
        })
    }

    /// Pause the queue; in-flight jobs are unaffected.
    pub async fn pause_queue(&self) -> Result<(), QueueError> {
        self.queue.pause().await?;
        info!("Notification queue paused");
        Ok(())
    }

    /// Resume the queue.
    pub async fn resume_queue(&self) -> Result<(), QueueError> {
        self.queue.resume().await?;
        info!("Notification queue resumed");
        Ok(())
    }

    /// Check if the queue is paused.
    pub async fn is_queue_paused(&self) -> Result<bool, QueueError> {
        self.queue.is_paused().await
    }

    /// Get queue health status.
    ///
    /// Converts any backend failure into a structured unhealthy result
    /// instead of raising.
    pub async fn get_queue_health(&self) -> QueueHealth {
        let outcome = async {
            let stats = self.get_queue_stats().await?;
            let is_paused = self.queue.is_paused().await?;
            Ok::<_, QueueError>((stats, is_paused))
        }
        .await;

        match outcome {
            Ok((stats, is_paused)) => QueueHealth {
                is_healthy: true,
                stats: Some(stats),
                is_paused: Some(is_paused),
                error: None,
                timestamp: Utc::now(),
            },
            Err(e) => {
                error!(error = %e, "Queue health check failed");
                QueueHealth {
                    is_healthy: false,
                    stats: None,
                    is_paused: None,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }

    /// Clean old completed jobs.
    ///
    /// Callers pass `DEFAULT_CLEAN_MAX_AGE_MS` / `DEFAULT_CLEAN_LIMIT`
    /// unless they have a reason not to.
    pub async fn clean_old_jobs(
        &self,
        max_age_ms: u64,
        limit: usize,
    ) -> Result<Vec<u64>, QueueError> {
        let cleaned = self
            .queue
            .clean(max_age_ms, limit, JobState::Completed)
            .await?;
        info!(count = cleaned.len(), "Cleaned old jobs from queue");
        Ok(cleaned)
    }

    /// Close the queue connection.
    pub async fn close(&self) -> Result<(), QueueError> {
        self.queue.close().await?;
        info!("Notification queue closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use job_queue::BackoffPolicy;

    fn sample_job(id: u64, intent: NotificationIntent) -> Job<NotificationIntent> {
        Job {
            id,
            name: JOB_NAME.to_string(),
            payload: intent,
            opts: JobOptions::default().with_backoff(BackoffPolicy::fixed(100)),
            state: JobState::Waiting,
            attempts_made: 0,
            created_at: Utc::now(),
            processed_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn test_add_notification_returns_job_handle() {
        let mut queue = MockNotificationQueue::new();
        queue
            .expect_submit()
            .withf(|intent, _| intent.user_id == "u1" && intent.kind == NotificationKind::Email)
            .returning(|intent, _| Ok(sample_job(7, intent)));

        let service = NotificationQueueService::new(queue);
        let job = service
            .add_notification(
                NotificationIntent::new("u1", "Hi"),
                JobOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(job.id, 7);
        assert_eq!(job.payload.user_id, "u1");
    }

    #[tokio::test]
    async fn test_add_notification_propagates_queue_errors_unchanged() {
        let mut queue = MockNotificationQueue::new();
        queue
            .expect_submit()
            .returning(|_, _| Err(QueueError::Closed));

        let service = NotificationQueueService::new(queue);
        let result = service
            .add_notification(NotificationIntent::new("u1", "Hi"), JobOptions::default())
            .await;

        assert!(matches!(result, Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn test_bulk_notifications() {
        let mut queue = MockNotificationQueue::new();
        queue.expect_submit_many().returning(|intents| {
            Ok(intents
                .into_iter()
                .enumerate()
                .map(|(i, intent)| sample_job(i as u64 + 1, intent))
                .collect())
        });

        let service = NotificationQueueService::new(queue);
        let jobs = service
            .add_bulk_notifications(vec![
                NotificationIntent::new("u1", "a"),
                NotificationIntent::new("u2", "b"),
            ])
            .await
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].payload.user_id, "u2");
    }

    #[tokio::test]
    async fn test_stats_maps_all_five_states() {
        let mut queue = MockNotificationQueue::new();
        queue.expect_counts().returning(|_| {
            Ok(HashMap::from([
                (JobState::Waiting, 3),
                (JobState::Active, 1),
                (JobState::Completed, 10),
                (JobState::Failed, 2),
                (JobState::Delayed, 4),
            ]))
        });

        let service = NotificationQueueService::new(queue);
        let stats = service.get_queue_stats().await.unwrap();

        assert_eq!(
            stats,
            QueueStats {
                waiting: 3,
                active: 1,
                completed: 10,
                failed: 2,
                delayed: 4,
            }
        );
    }

    #[tokio::test]
    async fn test_health_is_healthy_with_stats_and_pause_flag() {
        let mut queue = MockNotificationQueue::new();
        queue
            .expect_counts()
            .returning(|_| Ok(HashMap::from([(JobState::Waiting, 1)])));
        queue.expect_is_paused().returning(|| Ok(false));

        let service = NotificationQueueService::new(queue);
        let health = service.get_queue_health().await;

        assert!(health.is_healthy);
        assert_eq!(health.is_paused, Some(false));
        assert_eq!(health.stats.unwrap().waiting, 1);
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn test_health_converts_backend_failure_instead_of_raising() {
        let mut queue = MockNotificationQueue::new();
        queue
            .expect_counts()
            .returning(|_| Err(QueueError::Config("backend unreachable".to_string())));

        let service = NotificationQueueService::new(queue);
        let health = service.get_queue_health().await;

        assert!(!health.is_healthy);
        assert!(health.stats.is_none());
        assert!(health.is_paused.is_none());
        assert!(health.error.unwrap().contains("backend unreachable"));
    }

    #[tokio::test]
    async fn test_clean_old_jobs_targets_completed_state() {
        let mut queue = MockNotificationQueue::new();
        queue
            .expect_clean()
            .withf(|max_age, limit, state| {
                *max_age == DEFAULT_CLEAN_MAX_AGE_MS
                    && *limit == DEFAULT_CLEAN_LIMIT
                    && *state == JobState::Completed
            })
            .returning(|_, _, _| Ok(vec![1, 2, 3]));

        let service = NotificationQueueService::new(queue);
        let cleaned = service
            .clean_old_jobs(DEFAULT_CLEAN_MAX_AGE_MS, DEFAULT_CLEAN_LIMIT)
            .await
            .unwrap();

        assert_eq!(cleaned, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pause_resume_delegation() {
        let mut queue = MockNotificationQueue::new();
        queue.expect_pause().times(1).returning(|| Ok(()));
        queue.expect_resume().times(1).returning(|| Ok(()));
        queue.expect_is_paused().returning(|| Ok(true));

        let service = NotificationQueueService::new(queue);
        service.pause_queue().await.unwrap();
        service.resume_queue().await.unwrap();
        assert!(service.is_queue_paused().await.unwrap());
    }
}
