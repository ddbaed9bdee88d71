//! Notification record persistence.
//!
//! The worker only ever inserts; the recipient-facing API reads,
//! toggles the read flag, and deletes. Inserts are independent, so the
//! store has no cross-job shared mutable state.

use crate::error::NotificationResult;
use crate::models::Notification;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Database, IndexModel};
use tracing::debug;

/// Collection holding notification records.
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

/// Durable store for notification records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new record. Called once per processing attempt.
    async fn insert(&self, notification: &Notification) -> NotificationResult<()>;

    /// Most recent records for a user, newest first.
    async fn list_for_user(&self, user_id: &str, limit: i64)
        -> NotificationResult<Vec<Notification>>;

    /// Number of unread records for a user.
    async fn unread_count(&self, user_id: &str) -> NotificationResult<u64>;

    /// Mark one record read; returns whether a record was updated.
    async fn mark_read(&self, id: &str, user_id: &str) -> NotificationResult<bool>;

    /// Delete one record; returns whether a record was removed.
    async fn delete(&self, id: &str, user_id: &str) -> NotificationResult<bool>;
}

/// MongoDB-backed notification store.
#[derive(Clone)]
pub struct MongoNotificationStore {
    collection: mongodb::Collection<Notification>,
}

impl MongoNotificationStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(NOTIFICATIONS_COLLECTION),
        }
    }

    /// Create the indexes the recipient-facing queries rely on.
    pub async fn ensure_indexes(&self) -> NotificationResult<()> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "user": 1, "createdAt": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "user": 1, "read": 1 })
                .build(),
        ];
        self.collection.create_indexes(indexes).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn insert(&self, notification: &Notification) -> NotificationResult<()> {
        self.collection.insert_one(notification).await?;
        debug!(
            notification_id = %notification.id,
            user = %notification.user,
            kind = %notification.kind,
            "Persisted notification record"
        );
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> NotificationResult<Vec<Notification>> {
        let mut cursor = self
            .collection
            .find(doc! { "user": user_id })
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .await?;

        let mut notifications = Vec::new();
        while let Some(notification) = cursor.try_next().await? {
            notifications.push(notification);
        }
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: &str) -> NotificationResult<u64> {
        let count = self
            .collection
            .count_documents(doc! { "user": user_id, "read": false })
            .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: &str, user_id: &str) -> NotificationResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "user": user_id },
                doc! { "$set": { "read": true } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn delete(&self, id: &str, user_id: &str) -> NotificationResult<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "user": user_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
