//! Error types for the notifications domain.

use job_queue::QueueError;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
///
/// An unresolved recipient is deliberately NOT an error: the processor
/// degrades by skipping dispatch while keeping the persisted record.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Queue error (enqueue, counts, pause, ...).
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Record-store write or read error.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Transport rejected or failed to deliver a message.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// A recipient address could not be parsed.
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<mongodb::error::Error> for NotificationError {
    fn from(err: mongodb::error::Error) -> Self {
        NotificationError::Persistence(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotificationError::Delivery(err.to_string())
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        NotificationError::Delivery(err.to_string())
    }
}

impl From<lettre::address::AddressError> for NotificationError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotificationError::InvalidRecipient(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Bridge into the worker loop: a domain failure becomes a processing
/// error the queue retries per the job's options.
impl From<NotificationError> for QueueError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Queue(e) => e,
            other => QueueError::Processing(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_becomes_processing_error() {
        let err: QueueError = NotificationError::Delivery("relay refused".to_string()).into();
        assert!(matches!(err, QueueError::Processing(_)));
        assert!(err.to_string().contains("relay refused"));
    }

    #[test]
    fn test_queue_error_passes_through() {
        let err: QueueError = NotificationError::Queue(QueueError::Closed).into();
        assert!(matches!(err, QueueError::Closed));
    }
}
