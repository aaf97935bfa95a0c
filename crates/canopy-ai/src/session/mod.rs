//! Sessions: an append-only, parent-linked message log plus the call
//! mechanism and completion loop that write into it.
//!
//! A [`Session`] is a cheap view over one shared [`BaseSession`]. Views
//! differ only in the message new entries are parented under and in the
//! cancellation token that governs their work.

mod call;
mod complete;
pub(crate) mod context;
mod truncate;


pub use call::CallResult;
pub use complete::CompleteOptions;
pub use truncate::truncate_messages;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use canopy_common::{new_id, EventBus, SessionId};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::claims::SecurityClaims;
use crate::filter::{matches_all, MessageFilter};
use crate::message::{CompletionMessage, ContentType, Message, MessageType, Role};
use crate::runner::RunnerShared;
use crate::store::SessionRecord;
use crate::AiError;

struct SessionState {
    record: SessionRecord,
    record_dirty: bool,
    record_persisted: bool,
    messages: Vec<Message>,
    /// Messages before this position are already in the catalog.
    flushed: usize,
}

/// State shared by every view of one session.
pub(crate) struct BaseSession {
    id: SessionId,
    instance_id: String,
    claims: SecurityClaims,
    project_instructions: String,
    shared: Arc<RunnerShared>,
    state: RwLock<SessionState>,
    flush_lock: tokio::sync::Mutex<()>,
    events: EventBus<Message>,
}

impl BaseSession {
    pub(crate) fn new(
        shared: Arc<RunnerShared>,
        record: SessionRecord,
        messages: Vec<Message>,
        persisted: bool,
        dirty: bool,
        claims: SecurityClaims,
        project_instructions: String,
    ) -> Self {
        let events = EventBus::new(shared.config.session.subscriber_capacity);
        let flushed = if persisted { messages.len() } else { 0 };
        Self {
            id: record.id.clone(),
            instance_id: record.instance_id.clone(),
            claims,
            project_instructions,
            shared,
            state: RwLock::new(SessionState {
                record,
                record_dirty: dirty,
                record_persisted: persisted,
                messages,
                flushed,
            }),
            flush_lock: tokio::sync::Mutex::new(()),
            events,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(&self) -> Result<(), AiError> {
        let _guard = self.flush_lock.lock().await;

        let (record, insert_record, pending) = {
            let state = self.read_state();
            let record = state.record_dirty.then(|| state.record.clone());
            let pending = state.messages[state.flushed..].to_vec();
            (record, !state.record_persisted, pending)
        };
        if record.is_none() && pending.is_empty() {
            return Ok(());
        }

        let catalog = self.shared.services.catalog(&self.instance_id).await?;

        if let Some(record) = record {
            if insert_record {
                catalog.insert_session(&record).await?;
            } else {
                catalog.update_session(&record).await?;
            }
            let mut state = self.write_state();
            state.record_persisted = true;
            if state.record == record {
                state.record_dirty = false;
            }
        }

        let count = pending.len();
        for message in pending {
            catalog.insert_message(&message).await?;
            self.write_state().flushed += 1;
        }

        debug!(session_id = %self.id, messages = count, "session flushed");
        Ok(())
    }
}

/// A view of a session scoped under a parent message.
#[derive(Clone)]
pub struct Session {
    base: Arc<BaseSession>,
    parent_id: Option<String>,
    cancel: CancellationToken,
}

impl Session {
    pub(crate) fn root(base: Arc<BaseSession>) -> Self {
        Self {
            base,
            parent_id: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.base.id
    }

    pub fn instance_id(&self) -> &str {
        &self.base.instance_id
    }

    /// The message new entries are attached under. `None` at the root.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn claims(&self) -> &SecurityClaims {
        &self.base.claims
    }

    /// Project-specific guidance for the LLM, empty when none is set.
    pub fn project_instructions(&self) -> &str {
        &self.base.project_instructions
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A view whose new messages are attached under `parent_id`.
    pub fn with_parent(&self, parent_id: impl Into<String>) -> Session {
        Session {
            base: self.base.clone(),
            parent_id: Some(parent_id.into()),
            cancel: self.cancel.clone(),
        }
    }

    /// A view whose work stops when `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Session {
        Session {
            base: self.base.clone(),
            parent_id: self.parent_id.clone(),
            cancel: token,
        }
    }

    pub(crate) fn shared(&self) -> &RunnerShared {
        &self.base.shared
    }

    pub fn record(&self) -> SessionRecord {
        self.base.read_state().record.clone()
    }

    pub fn title(&self) -> String {
        self.base.read_state().record.title.clone()
    }

    pub fn update_title(&self, title: impl Into<String>) {
        let mut state = self.base.write_state();
        state.record.title = title.into();
        state.record.updated_on = Utc::now();
        state.record_dirty = true;
    }

    pub fn update_user_agent(&self, user_agent: impl Into<String>) {
        let user_agent = user_agent.into();
        let mut state = self.base.write_state();
        if state.record.user_agent == user_agent {
            return;
        }
        state.record.user_agent = user_agent;
        state.record.updated_on = Utc::now();
        state.record_dirty = true;
    }

    /// True when the record or some messages have not been flushed yet.
    pub fn has_unflushed(&self) -> bool {
        let state = self.base.read_state();
        state.record_dirty || state.flushed < state.messages.len()
    }

    /// Receive every message appended from now on. A receiver that falls
    /// behind loses the oldest messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.base.events.subscribe()
    }

    /// Append a message under this view's parent.
    pub fn add_message(
        &self,
        role: Role,
        message_type: MessageType,
        tool: impl Into<String>,
        content_type: ContentType,
        content: impl Into<String>,
    ) -> Message {
        let mut state = self.base.write_state();
        let message = Message {
            id: new_id(),
            parent_id: self.parent_id.clone(),
            session_id: self.base.id.clone(),
            index: state.messages.last().map_or(0, |m| m.index + 1),
            time: Utc::now(),
            role,
            message_type,
            tool: tool.into(),
            content_type,
            content: content.into(),
        };

        if role == Role::User && message_type == MessageType::Prompt && state.record.title.is_empty()
        {
            let max_chars = self.base.shared.config.session.title_max_chars;
            let title = derive_title(&message.content, max_chars);
            if !title.is_empty() {
                state.record.title = title;
                state.record.updated_on = message.time;
                state.record_dirty = true;
            }
        }

        state.messages.push(message.clone());
        self.base.events.publish(message.clone());
        message
    }

    /// Persist the record if dirty and every message not yet written.
    ///
    /// A cancelled caller still gets the configured grace period before
    /// the flush is abandoned.
    pub async fn flush(&self) -> Result<(), AiError> {
        let grace = self.base.shared.config.session.flush_grace();
        let started = tokio::time::Instant::now();
        let cancel = self.cancel.clone();
        let deadline = async move {
            cancel.cancelled().await;
            tokio::time::sleep_until(started + grace).await;
        };

        tokio::select! {
            biased;
            result = self.base.flush() => result,
            _ = deadline => {
                warn!(session_id = %self.base.id, "flush abandoned after grace period");
                Err(AiError::Cancelled)
            }
        }
    }

    /// Snapshot of the whole message log.
    pub fn all_messages(&self) -> Vec<Message> {
        self.base.read_state().messages.clone()
    }

    /// Messages passing every filter, in log order.
    pub fn messages(&self, filters: &[MessageFilter]) -> Vec<Message> {
        self.base
            .read_state()
            .messages
            .iter()
            .filter(|m| matches_all(filters, m))
            .cloned()
            .collect()
    }

    /// The first message passing every filter.
    pub fn message(&self, filters: &[MessageFilter]) -> Option<Message> {
        self.base
            .read_state()
            .messages
            .iter()
            .find(|m| matches_all(filters, m))
            .cloned()
    }

    pub fn message_by_id(&self, id: &str) -> Option<Message> {
        context::message_by_id(&self.base.read_state().messages, id).cloned()
    }

    /// Messages of the root call `id`: the call itself and, when `nested`,
    /// everything logged until the next root call; otherwise only its
    /// direct children.
    pub fn messages_by_call(&self, id: &str, nested: bool) -> Vec<Message> {
        context::messages_by_call(&self.base.read_state().messages, id, nested)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Root calls in log order.
    pub fn calls(&self) -> Vec<Message> {
        context::calls(&self.base.read_state().messages)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn latest_call(&self) -> Option<Message> {
        context::calls(&self.base.read_state().messages)
            .last()
            .map(|m| (*m).clone())
    }

    /// The root call this view is nested under.
    pub fn root_id(&self) -> Option<String> {
        let parent = self.parent_id.as_deref()?;
        context::root_id(&self.base.read_state().messages, parent)
    }

    /// The messages an LLM completion at this scope sees by default.
    pub fn default_completion_messages(&self) -> Vec<Message> {
        let Some(parent) = self.parent_id.as_deref() else {
            return Vec::new();
        };
        let state = self.base.read_state();
        context::default_completion_messages(&state.messages, parent)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Export messages for an LLM. Results of root calls are presented as
    /// plain assistant answers.
    pub fn completion_messages(&self, messages: &[Message]) -> Vec<CompletionMessage> {
        let state = self.base.read_state();
        context::completion_messages(&state.messages, messages)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.base.id)
            .field("parent_id", &self.parent_id)
            .finish()
    }
}

fn derive_title(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let mut title: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
    title.push_str("...");
    title
}
