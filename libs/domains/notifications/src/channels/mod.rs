//! Delivery channel adapters.
//!
//! Each notification medium gets a polymorphic sender behind a trait.
//! Email is the only wired transport; sms and push are logged by the
//! processor as extension points.

mod smtp;

pub use smtp::{SmtpChannel, SmtpConfig};

use crate::error::NotificationResult;
use async_trait::async_trait;

/// A composed outbound email, sanitized and ready for the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient email address.
    pub to: String,
    /// Subject line (already HTML-escaped).
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// HTML body (already HTML-escaped).
    pub html: String,
}

/// Receipt for a message the transport accepted.
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Transport-specific message ID for tracking, when available.
    pub message_id: Option<String>,
}

/// Trait for email sending transports.
///
/// A transport-level failure is surfaced as an error and never retried
/// internally; retry policy belongs to the job queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send an email.
    async fn send(&self, message: &EmailMessage) -> NotificationResult<SentMessage>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;

    /// Check if the transport is reachable/configured.
    async fn health_check(&self) -> NotificationResult<bool>;
}

/// Escape HTML-special characters for safe embedding in email content.
///
/// The entity table matches what recipients' clients expect unescaped
/// content to break on: `&`, `<`, `>`, `"`, `'` and `/`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}
