//! Queue topic definition for the notifications domain.

use job_queue::TopicDef;

/// Job name tag carried by every notification job.
pub const JOB_NAME: &str = "notification";

/// Notifications topic definition.
///
/// Used by both the producer facade and the worker so the topic name
/// and tuning cannot drift apart.
pub struct NotificationTopic;

impl TopicDef for NotificationTopic {
    /// Topic name for notification jobs.
    const NAME: &'static str = "notifications";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_topic_def() {
        assert_eq!(NotificationTopic::name(), "notifications");
        assert_eq!(NotificationTopic::LEASE_TIMEOUT_MS, 30_000);
        assert_eq!(JOB_NAME, "notification");
    }
}
