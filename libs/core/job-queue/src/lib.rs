//! Job Queue Framework
//!
//! A Redis-backed durable job queue for background processing.
//!
//! ## Features
//!
//! - **Durable jobs**: every job is a persisted record with an explicit
//!   lifecycle (waiting, delayed, active, completed, failed)
//! - **Priorities and delays**: higher-priority jobs are served first
//!   within the same readiness window; delayed jobs become waiting when due
//! - **Retries with backoff**: fixed or exponential, carried as data on
//!   the job and interpreted by the queue
//! - **Lease semantics**: a claimed job is owned by exactly one worker
//!   slot; expired leases are redelivered
//! - **Generic worker**: `QueueWorker<P, Proc>` processes any payload type
//! - **Prometheus metrics** and K8s-ready health endpoints
//!
//! ## Example
//!
//! ```ignore
//! use job_queue::{JobQueue, JobOptions, JobProcessor, QueueConfig, QueueWorker, TopicDef};
//!
//! struct MailTopic;
//! impl TopicDef for MailTopic {
//!     const NAME: &'static str = "mail";
//! }
//!
//! // Producer side
//! let queue = JobQueue::<MyPayload>::from_topic_def::<MailTopic>(redis);
//! let job = queue.enqueue("send", payload, JobOptions::default()).await?;
//!
//! // Worker side
//! let config = QueueConfig::from_topic_def::<MailTopic>();
//! let worker = QueueWorker::new(Arc::new(queue), processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod error;
mod health;
mod job;
pub mod metrics;
mod queue;
mod topic;
mod worker;

// Re-export main types
pub use config::QueueConfig;
pub use error::QueueError;
pub use health::{health_router, HealthState};
pub use job::{BackoffKind, BackoffPolicy, Job, JobOptions, JobState, DEFAULT_ATTEMPTS};
pub use metrics::{init_metrics, JobStatus};
pub use queue::JobQueue;
pub use topic::{TopicDef, TopicKeys};
pub use worker::{JobProcessor, QueueWorker};
