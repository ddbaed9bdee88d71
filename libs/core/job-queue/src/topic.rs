//! Topic definitions and key naming
//!
//! Each domain implements `TopicDef` to pin its topic name and worker
//! tuning in one place, so producers and workers cannot drift apart.

use crate::job::JobState;

/// Topic definition trait
///
/// # Example
///
/// ```rust,ignore
/// use job_queue::TopicDef;
///
/// pub struct NotificationTopic;
///
/// impl TopicDef for NotificationTopic {
///     const NAME: &'static str = "notifications";
/// }
/// ```
pub trait TopicDef: Send + Sync {
    /// The topic name; prefixes every key the queue touches.
    const NAME: &'static str;

    /// How long a leased job is owned by one worker slot before it
    /// becomes eligible for redelivery.
    const LEASE_TIMEOUT_MS: u64 = 30_000;

    /// Poll interval when no jobs are available.
    const POLL_INTERVAL_MS: u64 = 500;

    /// Maximum jobs leased per poll.
    const BATCH_SIZE: usize = 10;

    /// Get the topic name.
    fn name() -> &'static str {
        Self::NAME
    }
}

/// Computes the Redis keys for one topic
#[derive(Debug, Clone)]
pub struct TopicKeys {
    topic: String,
}

impl TopicKeys {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Counter the queue INCRs to assign job ids
    pub fn id_counter(&self) -> String {
        format!("{}:id", self.topic)
    }

    /// The durable record for one job
    pub fn job(&self, id: u64) -> String {
        format!("{}:job:{}", self.topic, id)
    }

    /// The sorted set indexing jobs in `state`
    pub fn state(&self, state: JobState) -> String {
        format!("{}:{}", self.topic, state)
    }

    /// Flag key set while the topic is paused
    pub fn paused(&self) -> String {
        format!("{}:paused", self.topic)
    }
}
