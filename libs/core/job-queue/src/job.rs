//! Job records and the job lifecycle state machine
//!
//! A job is the durable unit of work: a payload plus scheduling and
//! retry options. State transitions are driven by the worker's
//! processing outcome and the queue's scheduler, never by the payload.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Default maximum delivery tries when the caller supplies no options
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Upper bound for a single retry delay
const MAX_BACKOFF_MS: u64 = 300_000;

/// Lifecycle state of a job
///
/// ```text
/// enqueue ──> waiting ──> active ──> completed
///    │           ^           │
///    └─> delayed ┘           └─> delayed (retry) / failed (exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Eligible for a worker slot
    Waiting,
    /// Scheduled for the future (initial delay or retry backoff)
    Delayed,
    /// Leased by exactly one worker slot
    Active,
    /// Processed successfully
    Completed,
    /// Attempts exhausted
    Failed,
}

impl JobState {
    /// States a job can rest in once processing has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// How the inter-retry wait grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay between every retry
    Fixed,
    /// Delay doubles with each completed attempt
    Exponential,
}

/// Inter-retry wait policy, carried as data on the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(rename = "type")]
    pub kind: BackoffKind,
    pub delay_ms: u64,
}

impl BackoffPolicy {
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            delay_ms,
        }
    }

    pub fn exponential(delay_ms: u64) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            delay_ms,
        }
    }

    /// Delay before the next try, given the number of tries already made
    ///
    /// `attempt` is 1-based: the first retry (after one failed try) gets
    /// the base delay under both kinds.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let ms = match self.kind {
            BackoffKind::Fixed => self.delay_ms,
            BackoffKind::Exponential => self
                .delay_ms
                .saturating_mul(2u64.saturating_pow(exponent)),
        };
        Duration::from_millis(ms.min(MAX_BACKOFF_MS))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(1000)
    }
}

/// Scheduling and retry options, fixed at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Maximum delivery tries before the job fails permanently
    pub attempts: u32,
    /// Inter-retry wait policy
    pub backoff: BackoffPolicy,
    /// Higher priority is served first within the same readiness window
    pub priority: u8,
    /// Milliseconds before the job first becomes waiting
    pub delay_ms: u64,
}

impl JobOptions {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: BackoffPolicy::default(),
            priority: 0,
            delay_ms: 0,
        }
    }
}

/// A durable job record
///
/// Serialized as JSON into the queue's backing store; the payload type
/// is opaque to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<P> {
    /// Queue-assigned id, monotonically increasing per topic
    pub id: u64,
    /// Job name tag (e.g. "notification")
    pub name: String,
    pub payload: P,
    pub opts: JobOptions,
    pub state: JobState,
    /// Number of tries that have finished (successfully or not)
    pub attempts_made: u32,
    pub created_at: DateTime<Utc>,
    /// When the current/most recent lease started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Message of the most recent processing failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl<P> Job<P>
where
    P: Serialize + DeserializeOwned,
{
    pub(crate) fn new(id: u64, name: impl Into<String>, payload: P, opts: JobOptions) -> Self {
        let state = if opts.delay_ms > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };
        Self {
            id,
            name: name.into(),
            payload,
            opts,
            state,
            attempts_made: 0,
            created_at: Utc::now(),
            processed_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// Tries left before the job fails permanently
    pub fn attempts_remaining(&self) -> u32 {
        self.opts.attempts.saturating_sub(self.attempts_made)
    }

    /// Check whether all tries have been used up
    pub fn exhausted(&self) -> bool {
        self.attempts_made >= self.opts.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization() {
        assert_eq!(JobState::Waiting.to_string(), "waiting");
        assert_eq!(JobState::Delayed.as_ref(), "delayed");

        let state: JobState = "failed".parse().unwrap();
        assert_eq!(state, JobState::Failed);

        let json = serde_json::to_string(&JobState::Active).unwrap();
        assert_eq!(json, "\"active\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Active.is_terminal());
    }

    #[test]
    fn test_fixed_backoff() {
        let policy = BackoffPolicy::fixed(500);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_backoff() {
        // 1s, 2s, 4s, 8s ... capped at 5 minutes
        let policy = BackoffPolicy::exponential(1000);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(12), Duration::from_millis(300_000));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(300_000));
    }

    #[test]
    fn test_job_options_defaults() {
        let opts = JobOptions::default();
        assert_eq!(opts.attempts, DEFAULT_ATTEMPTS);
        assert_eq!(opts.priority, 0);
        assert_eq!(opts.delay_ms, 0);
        assert_eq!(opts.backoff.kind, BackoffKind::Exponential);
    }

    #[test]
    fn test_job_options_attempts_floor() {
        let opts = JobOptions::default().with_attempts(0);
        assert_eq!(opts.attempts, 1);
    }

    #[test]
    fn test_new_job_state_depends_on_delay() {
        let job = Job::new(1, "test", (), JobOptions::default());
        assert_eq!(job.state, JobState::Waiting);

        let job = Job::new(2, "test", (), JobOptions::default().with_delay_ms(1000));
        assert_eq!(job.state, JobState::Delayed);
    }

    #[test]
    fn test_exhausted() {
        let mut job = Job::new(1, "test", (), JobOptions::default().with_attempts(2));
        assert!(!job.exhausted());
        assert_eq!(job.attempts_remaining(), 2);

        job.attempts_made = 2;
        assert!(job.exhausted());
        assert_eq!(job.attempts_remaining(), 0);
    }

    #[test]
    fn test_job_record_round_trip() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Payload {
            value: String,
        }

        let job = Job::new(
            9,
            "notification",
            Payload {
                value: "hi".to_string(),
            },
            JobOptions::default().with_priority(3),
        );

        let json = serde_json::to_string(&job).unwrap();
        let back: Job<Payload> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 9);
        assert_eq!(back.payload, job.payload);
        assert_eq!(back.opts.priority, 3);
        assert_eq!(back.state, JobState::Waiting);
    }
}
