//! In-memory catalog store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use canopy_common::{SessionId, StoreError};
use tokio::sync::RwLock;

use super::{sort_recent_first, CatalogStore, SessionRecord};
use crate::message::Message;

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, SessionRecord>,
    messages: HashMap<SessionId, Vec<Message>>,
}

/// Thread-safe store that keeps everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    pub async fn message_count(&self, session_id: &SessionId) -> usize {
        self.tables
            .read()
            .await
            .messages
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_session(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        self.tables
            .read()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    async fn find_sessions(
        &self,
        instance_id: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut records: Vec<SessionRecord> = tables
            .sessions
            .values()
            .filter(|r| r.instance_id == instance_id)
            .filter(|r| owner_id.map_or(true, |owner| r.owner_id == owner))
            .cloned()
            .collect();
        sort_recent_first(&mut records);
        Ok(records)
    }

    async fn find_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, StoreError> {
        let tables = self.tables.read().await;
        let mut messages = tables.messages.get(session_id).cloned().unwrap_or_default();
        messages.sort_by_key(|m| m.index);
        Ok(messages)
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("session {}", record.id)));
        }
        tables.sessions.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("session {}", record.id))),
        }
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let log = tables.messages.entry(message.session_id.clone()).or_default();
        if log.iter().any(|m| m.id == message.id) {
            return Err(StoreError::Conflict(format!("message {}", message.id)));
        }
        log.push(message.clone());
        Ok(())
    }
}
