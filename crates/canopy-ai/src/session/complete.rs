//! The multi-turn LLM loop: ask, run requested tools, feed results back,
//! repeat until the model answers without calling tools.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{truncate_messages, Session};
use crate::message::{CompletionMessage, ContentBlock, ContentType, Message, MessageType, Role};
use crate::service::ToolDescriptor;
use crate::tools::schema::{self, OutputShape};
use crate::AiError;

#[derive(Debug, Clone, Default)]
pub struct CompleteOptions {
    /// Conversation to start from, typically
    /// [`Session::default_completion_messages`].
    pub messages: Vec<Message>,
    /// Names of registered tools the model may call.
    pub tools: Vec<String>,
    /// Overrides the default budget: one round without tools, the
    /// configured `completion.max_iterations` with tools.
    pub max_iterations: Option<usize>,
    /// Log the loop's messages directly under the caller's scope instead
    /// of inside a dedicated call.
    pub unwrap_call: bool,
}

impl CompleteOptions {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn unwrapped(mut self) -> Self {
        self.unwrap_call = true;
        self
    }
}

impl Session {
    /// Run the completion loop and decode the final answer as `T`.
    ///
    /// `T` decides the answer's shape: `String` for text, a struct or map
    /// for a JSON object, `()` to discard it.
    pub async fn complete<T>(&self, name: &str, opts: CompleteOptions) -> Result<T, AiError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let shape = OutputShape::of::<T>()?;
        let tools = self.tool_descriptors(&opts.tools)?;
        let budget = opts
            .max_iterations
            .unwrap_or(if tools.is_empty() {
                1
            } else {
                self.shared().config.completion.max_iterations as usize
            })
            .max(1);

        let value = if opts.unwrap_call {
            self.complete_loop(&opts.messages, &tools, budget, &shape).await?
        } else {
            let messages = opts.messages;
            self.call_lambda(Role::System, name, move |scope| async move {
                scope.complete_loop(&messages, &tools, budget, &shape).await
            })
            .await?
            .into_output::<Value>()?
        };

        serde_json::from_value(value)
            .map_err(|e| AiError::InvalidOutput(format!("{name}: {e}")))
    }

    fn tool_descriptors(&self, names: &[String]) -> Result<Vec<ToolDescriptor>, AiError> {
        let registry = &self.shared().registry;
        names
            .iter()
            .map(|name| {
                let tool = registry
                    .get(name)
                    .ok_or_else(|| AiError::UnknownTool(name.clone()))?;
                let spec = tool.spec();
                Ok(ToolDescriptor {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    input_schema: spec
                        .input_schema
                        .clone()
                        .filter(|s| !schema::is_empty_object(s)),
                })
            })
            .collect()
    }

    async fn complete_loop(
        &self,
        initial: &[Message],
        tools: &[ToolDescriptor],
        budget: usize,
        shape: &OutputShape,
    ) -> Result<Value, AiError> {
        let offered: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        let truncation = &self.shared().config.completion.truncation;
        let mut messages = self.completion_messages(initial);

        for iteration in 0..budget {
            let last = iteration + 1 == budget;
            let available = if last { &[][..] } else { tools };
            let request = truncate_messages(&messages, truncation);

            debug!(
                session_id = %self.id(),
                iteration,
                messages = request.len(),
                tools = available.len(),
                "requesting completion"
            );
            let response = self.request_completion(&request, available, shape).await?;

            if response.tool_calls().next().is_none() {
                return self.finish(&response, shape);
            }
            if last {
                break;
            }

            for block in &response.content {
                match block {
                    ContentBlock::Text(text) => {
                        self.add_message(
                            Role::Assistant,
                            MessageType::Progress,
                            "",
                            ContentType::Text,
                            text.clone(),
                        );
                    }
                    ContentBlock::ToolCall(call) => {
                        if !offered.contains(call.name.as_str()) {
                            return Err(AiError::UnknownTool(call.name.clone()));
                        }
                        let result = self.call_tool(Role::Assistant, &call.name, &call.input).await?;
                        messages.push(result.call.to_completion_message());
                        messages.push(result.result.to_completion_message());
                    }
                    ContentBlock::ToolResult(_) => {
                        return Err(AiError::Completion(
                            "unexpected tool result block in model response".into(),
                        ));
                    }
                }
            }
        }

        Err(AiError::NoFinalResult(budget))
    }

    async fn request_completion(
        &self,
        messages: &[CompletionMessage],
        tools: &[ToolDescriptor],
        shape: &OutputShape,
    ) -> Result<CompletionMessage, AiError> {
        let ai = self.shared().services.ai(self.instance_id()).await?;
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AiError::Cancelled),
            response = ai.complete(messages, tools, shape.schema()) => response,
        };
        response.map_err(|e| match e {
            AiError::Cancelled => AiError::Cancelled,
            other => AiError::Completion(other.to_string()),
        })
    }

    /// Record the final answer and convert it to the requested shape.
    fn finish(&self, response: &CompletionMessage, shape: &OutputShape) -> Result<Value, AiError> {
        let text = response.texts().collect::<Vec<_>>().join("\n");
        let content_type = match shape {
            OutputShape::Structured(_) => ContentType::Json,
            _ => ContentType::Text,
        };
        self.add_message(
            Role::Assistant,
            MessageType::Progress,
            "",
            content_type,
            text.clone(),
        );

        match shape {
            OutputShape::None => Ok(Value::Null),
            OutputShape::Text => Ok(Value::String(text)),
            OutputShape::Structured(_) => serde_json::from_str(strip_code_fence(&text))
                .map_err(|e| AiError::InvalidOutput(format!("answer is not valid JSON: {e}"))),
        }
    }
}

/// Models sometimes wrap JSON answers in a markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::strip_code_fence;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
