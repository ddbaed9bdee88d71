//! Job queue lifecycle integration tests
//!
//! Each test runs against its own Redis container.

use job_queue::{BackoffPolicy, JobOptions, JobQueue, JobState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use test_utils::TestRedis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping {
    label: String,
}

impl Ping {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

fn queue(redis: &TestRedis) -> JobQueue<Ping> {
    JobQueue::new(redis.manager(), "jobs")
}

#[tokio::test]
async fn test_enqueue_increments_waiting_count() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    let first = queue
        .enqueue("ping", Ping::new("a"), JobOptions::default())
        .await
        .unwrap();
    let second = queue
        .enqueue("ping", Ping::new("b"), JobOptions::default())
        .await
        .unwrap();

    assert!(second.id > first.id);
    assert_eq!(first.state, JobState::Waiting);

    let counts = queue
        .counts(&[JobState::Waiting, JobState::Active])
        .await
        .unwrap();
    assert_eq!(counts[&JobState::Waiting], 2);
    assert_eq!(counts[&JobState::Active], 0);
}

#[tokio::test]
async fn test_lease_respects_priority_then_fifo() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    queue
        .enqueue("ping", Ping::new("low-1"), JobOptions::default())
        .await
        .unwrap();
    queue
        .enqueue(
            "ping",
            Ping::new("high"),
            JobOptions::default().with_priority(5),
        )
        .await
        .unwrap();
    queue
        .enqueue("ping", Ping::new("low-2"), JobOptions::default())
        .await
        .unwrap();

    let jobs = queue.lease(10).await.unwrap();
    let labels: Vec<&str> = jobs.iter().map(|j| j.payload.label.as_str()).collect();
    assert_eq!(labels, vec!["high", "low-1", "low-2"]);

    for job in &jobs {
        assert_eq!(job.state, JobState::Active);
    }
}

#[tokio::test]
async fn test_delayed_job_becomes_waiting_when_due() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    let job = queue
        .enqueue(
            "ping",
            Ping::new("later"),
            JobOptions::default().with_delay_ms(300),
        )
        .await
        .unwrap();
    assert_eq!(job.state, JobState::Delayed);

    assert!(queue.lease(10).await.unwrap().is_empty());
    let counts = queue.counts(&[JobState::Delayed]).await.unwrap();
    assert_eq!(counts[&JobState::Delayed], 1);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let jobs = queue.lease(10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, job.id);
}

#[tokio::test]
async fn test_pause_blocks_lease_and_resume_restores() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    queue
        .enqueue("ping", Ping::new("a"), JobOptions::default())
        .await
        .unwrap();

    queue.pause().await.unwrap();
    assert!(queue.is_paused().await.unwrap());
    assert!(queue.lease(10).await.unwrap().is_empty());

    queue.resume().await.unwrap();
    assert!(!queue.is_paused().await.unwrap());
    assert_eq!(queue.lease(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ack_moves_job_to_completed() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    queue
        .enqueue("ping", Ping::new("a"), JobOptions::default())
        .await
        .unwrap();

    let jobs = queue.lease(1).await.unwrap();
    queue.ack(&jobs[0]).await.unwrap();

    let counts = queue
        .counts(&[JobState::Waiting, JobState::Active, JobState::Completed])
        .await
        .unwrap();
    assert_eq!(counts[&JobState::Waiting], 0);
    assert_eq!(counts[&JobState::Active], 0);
    assert_eq!(counts[&JobState::Completed], 1);

    let record = queue.job(jobs[0].id).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Completed);
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_fail_retries_with_backoff_then_fails_permanently() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    queue
        .enqueue(
            "ping",
            Ping::new("flaky"),
            JobOptions::default()
                .with_attempts(2)
                .with_backoff(BackoffPolicy::fixed(100)),
        )
        .await
        .unwrap();

    // First try fails -> retry scheduled
    let jobs = queue.lease(1).await.unwrap();
    let outcome = queue.fail(&jobs[0], "relay down").await.unwrap();
    assert_eq!(outcome, JobState::Delayed);

    let counts = queue.counts(&[JobState::Delayed]).await.unwrap();
    assert_eq!(counts[&JobState::Delayed], 1);

    // Not leasable until the backoff elapses
    assert!(queue.lease(1).await.unwrap().is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let jobs = queue.lease(1).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].attempts_made, 1);

    // Second try exhausts the attempts
    let outcome = queue.fail(&jobs[0], "relay still down").await.unwrap();
    assert_eq!(outcome, JobState::Failed);

    let record = queue.job(jobs[0].id).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Failed);
    assert_eq!(record.attempts_made, 2);
    assert_eq!(record.last_error.as_deref(), Some("relay still down"));
}

#[tokio::test]
async fn test_expired_lease_is_redelivered() {
    let redis = TestRedis::new().await;
    let queue = JobQueue::<Ping>::new(redis.manager(), "jobs").with_lease_timeout_ms(100);

    queue
        .enqueue("ping", Ping::new("stalled"), JobOptions::default())
        .await
        .unwrap();

    let jobs = queue.lease(1).await.unwrap();
    assert_eq!(jobs.len(), 1);

    // Slot "crashes": no ack, no fail. After the lease expires the job
    // must be leasable again with no attempt charged.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let redelivered = queue.lease(1).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].id, jobs[0].id);
    assert_eq!(redelivered[0].attempts_made, 0);
}

#[tokio::test]
async fn test_clean_removes_old_completed_jobs() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    for label in ["a", "b", "c"] {
        queue
            .enqueue("ping", Ping::new(label), JobOptions::default())
            .await
            .unwrap();
    }
    let jobs = queue.lease(10).await.unwrap();
    for job in &jobs {
        queue.ack(job).await.unwrap();
    }

    let removed = queue.clean(0, 100, JobState::Completed).await.unwrap();
    assert_eq!(removed.len(), 3);

    let counts = queue.counts(&[JobState::Completed]).await.unwrap();
    assert_eq!(counts[&JobState::Completed], 0);

    for id in removed {
        assert!(queue.job(id).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_clean_rejects_non_terminal_state() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    let result = queue.clean(0, 100, JobState::Waiting).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_enqueue_bulk_is_sequential_and_counted() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    let jobs = queue
        .enqueue_bulk(vec![
            ("ping".to_string(), Ping::new("a")),
            ("ping".to_string(), Ping::new("b")),
            ("ping".to_string(), Ping::new("c")),
        ])
        .await
        .unwrap();

    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[1].id, jobs[0].id + 1);
    assert_eq!(jobs[2].id, jobs[0].id + 2);

    let counts = queue.counts(&[JobState::Waiting]).await.unwrap();
    assert_eq!(counts[&JobState::Waiting], 3);

    let empty = queue.enqueue_bulk(vec![]).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_operations() {
    let redis = TestRedis::new().await;
    let queue = queue(&redis);

    queue.close().await.unwrap();
    queue.close().await.unwrap();

    let result = queue
        .enqueue("ping", Ping::new("late"), JobOptions::default())
        .await;
    assert!(matches!(result, Err(job_queue::QueueError::Closed)));

    // Clones share the closed flag
    let clone = queue.clone();
    assert!(matches!(
        clone.counts(&[JobState::Waiting]).await,
        Err(job_queue::QueueError::Closed)
    ));
}
