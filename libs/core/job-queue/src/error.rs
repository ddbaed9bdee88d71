//! Queue error types
//!
//! The queue surfaces backend failures unchanged; retry policy lives on
//! the job itself (`JobOptions`), not on error categories.

use thiserror::Error;

/// Errors produced by the queue and its worker loop
#[derive(Error, Debug)]
pub enum QueueError {
    /// The backing store cannot be reached or rejected a command
    #[error("queue backend unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),

    /// A job record could not be serialized or deserialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The queue handle has been closed
    #[error("queue is closed")]
    Closed,

    /// Invalid configuration or unsupported operation argument
    #[error("configuration error: {0}")]
    Config(String),

    /// A processor failed while handling a job
    #[error("processing error: {0}")]
    Processing(String),
}

impl QueueError {
    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        QueueError::Processing(message.into())
    }

    /// Check if this error is a connection-level failure worth backing
    /// off on (as opposed to a command or data error)
    pub fn is_connection_error(&self) -> bool {
        match self {
            QueueError::Unavailable(e) => {
                let lower = e.to_string().to_lowercase();
                lower.contains("connection")
                    || lower.contains("disconnected")
                    || lower.contains("broken pipe")
                    || lower.contains("reset by peer")
                    || lower.contains("refused")
                    || lower.contains("timed out")
                    || lower.contains("eof")
                    || lower.contains("io error")
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_detection() {
        let err = QueueError::Unavailable(redis::RedisError::from((
            redis::ErrorKind::Io,
            "Connection refused",
        )));
        assert!(err.is_connection_error());

        let err = QueueError::Serialization("bad json".to_string());
        assert!(!err.is_connection_error());

        assert!(!QueueError::Closed.is_connection_error());
    }

    #[test]
    fn test_processing_helper() {
        let err = QueueError::processing("mail bounced");
        assert_eq!(err.to_string(), "processing error: mail bounced");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<u32>("not-a-number").unwrap_err();
        let err: QueueError = parse_err.into();
        assert!(matches!(err, QueueError::Serialization(_)));
    }
}
