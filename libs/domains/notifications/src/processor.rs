//! The notification processor: the per-job state machine run by the
//! worker.
//!
//! received -> persisted -> dispatched -> acknowledged, or failed when
//! any step errors. Record creation and recipient lookup run
//! concurrently; dispatch only starts once the record exists, so a
//! persistence failure prevents delivery while a delivery failure never
//! rolls back persistence.

use crate::channels::{escape_html, EmailMessage, EmailTransport};
use crate::error::NotificationResult;
use crate::models::{Notification, NotificationIntent, NotificationKind};
use crate::recipients::RecipientDirectory;
use crate::store::NotificationStore;
use async_trait::async_trait;
use job_queue::{Job, JobProcessor, QueueError};
use std::sync::Arc;
use tracing::info;

/// Processes notification jobs: persists the record, resolves the
/// recipient, and dispatches through the channel matching the intent's
/// kind.
pub struct NotificationProcessor<S, D, M> {
    store: Arc<S>,
    directory: Arc<D>,
    mailer: Arc<M>,
}

impl<S, D, M> NotificationProcessor<S, D, M>
where
    S: NotificationStore,
    D: RecipientDirectory,
    M: EmailTransport,
{
    pub fn new(store: S, directory: D, mailer: M) -> Self {
        Self {
            store: Arc::new(store),
            directory: Arc::new(directory),
            mailer: Arc::new(mailer),
        }
    }

    pub fn with_arcs(store: Arc<S>, directory: Arc<D>, mailer: Arc<M>) -> Self {
        Self {
            store,
            directory,
            mailer,
        }
    }

    /// Handle one intent.
    ///
    /// Missing payload fields were already papered over with defaults
    /// by the model layer; nothing is rejected here. Every error
    /// propagates so the queue can apply the job's retry policy.
    pub async fn handle(&self, intent: &NotificationIntent) -> NotificationResult<()> {
        let record = Notification::from_intent(intent);

        // No ordering dependency between the two lookups.
        let (persisted, recipient) = tokio::join!(
            self.store.insert(&record),
            self.directory.find(&intent.user_id),
        );
        persisted?;
        let recipient = recipient?;

        match intent.kind {
            NotificationKind::Email => {
                let address = recipient
                    .as_ref()
                    .and_then(|r| r.email.as_deref())
                    .filter(|email| !email.is_empty());

                match address {
                    Some(address) => self.send_email(address, intent).await?,
                    // Degraded-continue: record kept, dispatch skipped.
                    None => info!(
                        user_id = %intent.user_id,
                        "Recipient has no email address, skipping dispatch"
                    ),
                }
            }
            NotificationKind::Sms => {
                info!(user_id = %intent.user_id, "SMS notification queued");
            }
            NotificationKind::Push => {
                info!(user_id = %intent.user_id, "Push notification queued");
            }
            NotificationKind::Assignment | NotificationKind::Course => {}
        }

        info!(
            user_id = %intent.user_id,
            kind = %intent.kind,
            "Notification processed successfully"
        );

        Ok(())
    }

    async fn send_email(&self, to: &str, intent: &NotificationIntent) -> NotificationResult<()> {
        let message = EmailMessage {
            to: to.to_string(),
            subject: escape_html(intent.subject()),
            text: intent.message.clone(),
            html: format!("<p>{}</p>", escape_html(&intent.message)),
        };

        let sent = self.mailer.send(&message).await?;

        info!(
            user_id = %intent.user_id,
            message_id = ?sent.message_id,
            "Email sent successfully"
        );

        Ok(())
    }
}

#[async_trait]
impl<S, D, M> JobProcessor<NotificationIntent> for NotificationProcessor<S, D, M>
where
    S: NotificationStore + 'static,
    D: RecipientDirectory + 'static,
    M: EmailTransport + 'static,
{
    async fn process(&self, job: &Job<NotificationIntent>) -> Result<(), QueueError> {
        info!(
            job_id = %job.id,
            user_id = %job.payload.user_id,
            kind = %job.payload.kind,
            attempts_made = %job.attempts_made,
            "Processing notification job"
        );

        self.handle(&job.payload).await.map_err(QueueError::from)
    }

    fn name(&self) -> &'static str {
        "NotificationProcessor"
    }

    async fn health_check(&self) -> Result<bool, QueueError> {
        self.mailer
            .health_check()
            .await
            .map_err(|e| QueueError::Processing(e.to_string()))
    }
}

impl<S, D, M> Clone for NotificationProcessor<S, D, M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            mailer: Arc::clone(&self.mailer),
        }
    }
}
