//! Data models for the notifications domain.
//!
//! The wire format is camelCase JSON: intents travel through the job
//! queue exactly as request handlers submit them, and the persisted
//! notification keeps the same field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Intent types (producer input / queue payload)
// ============================================================================

/// Delivery medium (or domain event class) of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Deliver via the email channel.
    #[default]
    Email,
    /// SMS; queued and logged, no transport wired yet.
    Sms,
    /// Push; queued and logged, no transport wired yet.
    Push,
    /// Assignment event, persist-only.
    Assignment,
    /// Course event, persist-only.
    Course,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Email => write!(f, "email"),
            NotificationKind::Sms => write!(f, "sms"),
            NotificationKind::Push => write!(f, "push"),
            NotificationKind::Assignment => write!(f, "assignment"),
            NotificationKind::Course => write!(f, "course"),
        }
    }
}

/// Display priority attached by callers, surfaced to the recipient UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagePriority::Low => write!(f, "low"),
            MessagePriority::Medium => write!(f, "medium"),
            MessagePriority::High => write!(f, "high"),
        }
    }
}

/// Structured metadata on a notification intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<MessagePriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

/// Structured payload on a notification intent.
///
/// Every field is optional; absence is never rejected at enqueue time.
/// `subject` is a legacy top-level fallback for the email subject and
/// is not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<IntentMetadata>,
}

/// The caller-supplied description of a notification, before queueing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIntent {
    /// Opaque recipient identifier.
    pub user_id: String,
    /// Plain-text message body.
    pub message: String,
    /// Delivery medium; defaults to email when absent on the wire.
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<IntentData>,
}

impl NotificationIntent {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            kind: NotificationKind::default(),
            data: None,
        }
    }

    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_data(mut self, data: IntentData) -> Self {
        self.data = Some(data);
        self
    }

    /// Resolve the email subject: `data.metadata.subject`, then the
    /// legacy `data.subject`, then a default literal.
    pub fn subject(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|d| {
                d.metadata
                    .as_ref()
                    .and_then(|m| m.subject.as_deref())
                    .or(d.subject.as_deref())
            })
            .unwrap_or("Notification")
    }
}

// ============================================================================
// Persisted types (record store)
// ============================================================================

/// The persisted shape of an intent's `data`, with the documented
/// defaulting applied once at worker ingestion: missing fields become
/// explicit nulls and a missing `metadata` becomes `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub assignment_id: Option<String>,
    pub course_id: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: IntentMetadata,
}

impl NotificationData {
    pub fn from_intent_data(data: Option<&IntentData>) -> Self {
        match data {
            Some(d) => Self {
                assignment_id: d.assignment_id.clone(),
                course_id: d.course_id.clone(),
                url: d.url.clone(),
                metadata: d.metadata.clone().unwrap_or_default(),
            },
            None => Self::default(),
        }
    }
}

/// The durable record that a notification was processed for a user.
///
/// Created by the worker when a job is processed, never when it is
/// enqueued; its existence implies at least one processing attempt, not
/// delivery success. Only the recipient-facing API mutates it afterwards
/// (read toggling, deletion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Recipient reference.
    pub user: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub data: NotificationData,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_intent(intent: &NotificationIntent) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: intent.user_id.clone(),
            message: intent.message.clone(),
            kind: intent.kind,
            data: NotificationData::from_intent_data(intent.data.as_ref()),
            read: false,
            created_at: Utc::now(),
        }
    }
}
