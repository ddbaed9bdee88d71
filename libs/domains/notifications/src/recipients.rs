//! Recipient lookup.
//!
//! The worker resolves the intent's `user_id` against the users
//! collection owned by the account subsystem. A missing user is a
//! degraded-continue, never an error: the record is persisted anyway
//! and dispatch is skipped.

use crate::error::NotificationResult;
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::Database;
use serde::{Deserialize, Serialize};

/// Collection holding user accounts (owned by the accounts subsystem).
pub const USERS_COLLECTION: &str = "users";

/// The projection of a user the dispatch path needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Lookup of recipients by their opaque id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Find a recipient; `Ok(None)` when the user does not exist.
    async fn find(&self, user_id: &str) -> NotificationResult<Option<Recipient>>;
}

/// MongoDB-backed recipient directory over the users collection.
#[derive(Clone)]
pub struct MongoRecipientDirectory {
    collection: mongodb::Collection<Recipient>,
}

impl MongoRecipientDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USERS_COLLECTION),
        }
    }
}

#[async_trait]
impl RecipientDirectory for MongoRecipientDirectory {
    async fn find(&self, user_id: &str) -> NotificationResult<Option<Recipient>> {
        let recipient = self.collection.find_one(doc! { "_id": user_id }).await?;
        Ok(recipient)
    }
}
