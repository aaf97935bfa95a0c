//! File-backed catalog store.
//!
//! Layout under the data directory:
//! - `sessions/<id>.json`: the session record, replaced atomically
//! - `messages/<id>.jsonl`: the message log, one JSON message per line

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use canopy_common::{SessionId, StoreError};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{sort_recent_first, CatalogStore, SessionRecord};
use crate::message::Message;

pub struct FileCatalogStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCatalogStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("sessions"))?;
        std::fs::create_dir_all(root.join("messages"))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, id: &SessionId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join("sessions").join(format!("{}.json", file_stem(id)?)))
    }

    fn messages_path(&self, id: &SessionId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join("messages").join(format!("{}.jsonl", file_stem(id)?)))
    }

    async fn write_record(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.session_path(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;

        // Atomic write: write to .tmp, then rename
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            warn!("atomic rename failed ({}), falling back to direct write", e);
            tokio::fs::write(&path, &json).await?;
        }

        debug!(session_id = %record.id, path = %path.display(), "session record saved");
        Ok(())
    }
}

/// Session ids become file names, so anything that could escape the
/// store directory is rejected.
fn file_stem(id: &SessionId) -> Result<&str, StoreError> {
    let stem = id.as_str();
    let valid = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(stem)
    } else {
        Err(StoreError::NotFound(format!("invalid session id {stem:?}")))
    }
}

#[async_trait]
impl CatalogStore for FileCatalogStore {
    async fn find_session(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        let path = self.session_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("session {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_sessions(
        &self,
        instance_id: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(self.root.join("sessions")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            let record: SessionRecord = match serde_json::from_str(&content) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), "skipping unreadable session record: {e}");
                    continue;
                }
            };
            if record.instance_id != instance_id {
                continue;
            }
            if owner_id.is_some_and(|owner| record.owner_id != owner) {
                continue;
            }
            records.push(record);
        }
        sort_recent_first(&mut records);
        Ok(records)
    }

    async fn find_messages(&self, session_id: &SessionId) -> Result<Vec<Message>, StoreError> {
        let path = self.messages_path(session_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut messages = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<Message>)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by_key(|m| m.index);
        Ok(messages)
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(self.session_path(&record.id)?).await? {
            return Err(StoreError::Conflict(format!("session {}", record.id)));
        }
        self.write_record(record).await
    }

    async fn update_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if !tokio::fs::try_exists(self.session_path(&record.id)?).await? {
            return Err(StoreError::NotFound(format!("session {}", record.id)));
        }
        self.write_record(record).await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let path = self.messages_path(&message.session_id)?;
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
