//! Durable storage of session records and message logs.
//!
//! Records are upserted through insert/update; messages are append-only.

mod file;
mod memory;

pub use file::FileCatalogStore;
pub use memory::MemoryCatalogStore;

use async_trait::async_trait;
use canopy_common::{SessionId, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Persisted session metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub instance_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user_agent: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(id: SessionId, instance_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            instance_id: instance_id.into(),
            owner_id: owner_id.into(),
            title: String::new(),
            user_agent: String::new(),
            created_on: now,
            updated_on: now,
        }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_session(&self, id: &SessionId) -> Result<SessionRecord, StoreError>;

    /// Sessions of an instance, most recently updated first.
    async fn find_sessions(
        &self,
        instance_id: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<SessionRecord>, StoreError>;

    /// Messages of a session ordered by index.
    async fn find_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, StoreError>;

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn update_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;
}

fn sort_recent_first(records: &mut [SessionRecord]) {
    records.sort_by(|a, b| b.updated_on.cmp(&a.updated_on));
}
