//! Notifications Domain
//!
//! Asynchronous notification pipeline for the Campus backend: request
//! handlers submit notification intents through the producer facade,
//! a worker persists a notification record and performs the delivery
//! side-effect outside the request path.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Request Handler   │  ← builds a NotificationIntent
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │ NotificationQueue   │  ← producer facade over the job queue
//! │      Service        │
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │  Job Queue (Redis)  │  ← "notifications" topic
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │ NotificationProcessor│ ← persists the record, looks up the
//! └──────────┬──────────┘   recipient, dispatches by type
//!            │
//! ┌──────────▼──────────┐
//! │   Email Channel     │  ← SMTP; sms/push are logged extension points
//! └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{NotificationIntent, NotificationQueueService};
//! use job_queue::{JobOptions, JobQueue};
//!
//! let queue = JobQueue::from_topic_def::<NotificationTopic>(redis);
//! let service = NotificationQueueService::new(queue);
//!
//! let intent = NotificationIntent::new("user-1", "Your assignment has been graded");
//! let job = service.add_notification(intent, JobOptions::default()).await?;
//! ```

pub mod channels;
pub mod error;
pub mod models;
pub mod processor;
pub mod recipients;
pub mod service;
pub mod store;
pub mod topic;

// Re-export commonly used types
pub use channels::{escape_html, EmailMessage, EmailTransport, SentMessage, SmtpChannel, SmtpConfig};
pub use error::{NotificationError, NotificationResult};
pub use models::{
    IntentData, IntentMetadata, MessagePriority, Notification, NotificationData,
    NotificationIntent, NotificationKind,
};
pub use processor::NotificationProcessor;
pub use recipients::{MongoRecipientDirectory, Recipient, RecipientDirectory};
pub use service::{
    NotificationQueue, NotificationQueueService, QueueHealth, QueueStats, DEFAULT_CLEAN_LIMIT,
    DEFAULT_CLEAN_MAX_AGE_MS,
};
pub use store::{MongoNotificationStore, NotificationStore};
pub use topic::{NotificationTopic, JOB_NAME};
