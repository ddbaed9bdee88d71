//! Worker configuration
//!
//! This module provides `QueueConfig` for tuning the worker loop.

use crate::topic::TopicDef;
use uuid::Uuid;

/// Configuration for the queue worker
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Topic name
    pub topic: String,

    /// Unique consumer ID (auto-generated if not provided)
    pub consumer_id: String,

    /// Poll interval in milliseconds when no jobs are available
    pub poll_interval_ms: u64,

    /// Maximum jobs leased per poll
    pub batch_size: usize,

    /// Maximum concurrent job-processing slots
    pub max_concurrent_jobs: usize,
}

impl QueueConfig {
    /// Create a QueueConfig from a TopicDef
    pub fn from_topic_def<T: TopicDef>() -> Self {
        Self {
            topic: T::NAME.to_string(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            poll_interval_ms: T::POLL_INTERVAL_MS,
            batch_size: T::BATCH_SIZE,
            max_concurrent_jobs: 1, // Sequential by default
        }
    }

    /// Create a QueueConfig with explicit values
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            poll_interval_ms: 500,
            batch_size: 10,
            max_concurrent_jobs: 1,
        }
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the maximum concurrent job-processing slots
    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("jobs")
    }
}
