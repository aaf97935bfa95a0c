//! The LLM backend contract consumed by the completion loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::CompletionMessage;
use crate::AiError;

/// A tool as offered to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Omitted when the tool takes no parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

#[async_trait]
pub trait AiService: Send + Sync {
    /// Produce the next assistant message.
    ///
    /// `output_schema` is set when the caller expects a structured
    /// (JSON object) final answer.
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        tools: &[ToolDescriptor],
        output_schema: Option<&Value>,
    ) -> Result<CompletionMessage, AiError>;
}
