//! Session messages and their export to LLM completion messages.
//!
//! A session is a flat log of messages linked by `parent_id`. Root
//! messages (no parent) are the top-level calls; everything a call
//! produces hangs below it.

use std::fmt;

use canopy_common::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Prompt,
    Call,
    Progress,
    Result,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Prompt => "prompt",
            MessageType::Call => "call",
            MessageType::Progress => "progress",
            MessageType::Result => "result",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Json,
    Error,
}

/// One node of a session's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub session_id: SessionId,
    /// Position in the session log, strictly increasing in append order.
    pub index: u64,
    pub time: DateTime<Utc>,
    pub role: Role,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tool: String,
    pub content_type: ContentType,
    pub content: String,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.content_type == ContentType::Error
    }

    /// Export as a single-block completion message.
    ///
    /// Prompts and progress become text, calls become tool-call blocks
    /// keyed by the call's id, and results become tool-result blocks
    /// keyed by their parent call.
    pub fn to_completion_message(&self) -> CompletionMessage {
        let block = match self.message_type {
            MessageType::Prompt | MessageType::Progress => ContentBlock::Text(self.content.clone()),
            MessageType::Call => ContentBlock::ToolCall(ToolCall {
                id: self.id.clone(),
                name: self.tool.clone(),
                input: self.call_input(),
            }),
            MessageType::Result => ContentBlock::ToolResult(ToolResult {
                id: self.parent_id.clone().unwrap_or_default(),
                content: self.content.clone(),
                is_error: self.is_error(),
            }),
        };
        CompletionMessage {
            role: self.role,
            content: vec![block],
        }
    }

    /// Export as plain assistant text, used for the outcome of a root call.
    /// A JSON string result is unquoted.
    pub fn to_assistant_text(&self) -> CompletionMessage {
        let text = match (self.content_type, serde_json::from_str::<Value>(&self.content)) {
            (ContentType::Json, Ok(Value::String(text))) => text,
            _ => self.content.clone(),
        };
        CompletionMessage::text(Role::Assistant, text)
    }

    fn call_input(&self) -> Value {
        if self.content.is_empty() {
            return Value::Object(Default::default());
        }
        if self.content_type == ContentType::Json {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&self.content) {
                return value;
            }
        }
        serde_json::json!({ "content": self.content })
    }
}

/// A message in the shape exchanged with an LLM backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl CompletionMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentBlock {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub content: String,
    pub is_error: bool,
}
