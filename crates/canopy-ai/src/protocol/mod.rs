//! Exposure of registered tools to an external protocol client.
//!
//! The wire encoding is left to the transport; this module defines the
//! request/response model, the per-session server, and how each request
//! is bound to a session and flushed afterwards.

mod server;

pub use server::{ProtocolServer, RequestContext, SessionProtocol, ToolHandler};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Role;
use crate::tools::ToolSpec;
use crate::AiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl ClientInfo {
    /// `name/version`, or just the name when no version was sent.
    pub fn user_agent(&self) -> String {
        if self.version.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.name, self.version)
        }
    }
}

/// Requests a client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ProtocolRequest {
    #[serde(rename = "initialize")]
    Initialize { client: ClientInfo },

    #[serde(rename = "tools/list")]
    ListTools,

    #[serde(rename = "tools/call")]
    CallTool {
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

/// Responses the server sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtocolResponse {
    #[serde(rename = "initialized")]
    Initialized { server: ServerInfo },

    #[serde(rename = "tools")]
    Tools { tools: Vec<ToolSpec> },

    #[serde(rename = "tool_result")]
    ToolResult(ToolCallResponse),
}

/// Outcome of a tool call as seen by the client. Caller errors are
/// reported here with `is_error` set; only internal failures become
/// protocol errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResponse {
    pub fn success(text: impl Into<String>, structured_content: Option<Value>) -> Self {
        Self {
            text: text.into(),
            structured_content,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured_content: None,
            is_error: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("no session bound to request")]
    NoSession,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("flush failed: {flush}{}", request_suffix(.request))]
    Flush {
        flush: String,
        request: Option<String>,
    },
}

fn request_suffix(request: &Option<String>) -> String {
    request
        .as_ref()
        .map(|e| format!(" (request error: {e})"))
        .unwrap_or_default()
}

/// Run a tool through the session bound to `ctx`, as an assistant call.
pub(crate) async fn call_through_session(
    ctx: RequestContext,
    name: &str,
    arguments: Value,
    structured: bool,
) -> Result<ToolCallResponse, ProtocolError> {
    let session = ctx.session.ok_or(ProtocolError::NoSession)?;

    let result = match session.call_tool(Role::Assistant, name, &arguments).await {
        Ok(result) => result,
        Err(AiError::Cancelled) => return Err(ProtocolError::Cancelled),
        Err(e) => return Err(ProtocolError::Internal(e.to_string())),
    };

    match result.error() {
        Some(e) if e.is_internal() => Err(ProtocolError::Internal(e.to_string())),
        Some(e) => Ok(ToolCallResponse::error(e.to_string())),
        None => {
            let structured_content = if structured {
                result.output().cloned()
            } else {
                None
            };
            Ok(ToolCallResponse::success(
                result.result.content.clone(),
                structured_content,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_use_method_tags() {
        let req: ProtocolRequest =
            serde_json::from_str(r#"{"method":"tools/call","name":"echo","arguments":{"a":1}}"#)
                .unwrap();
        assert_eq!(
            req,
            ProtocolRequest::CallTool {
                name: "echo".into(),
                arguments: serde_json::json!({ "a": 1 }),
            }
        );

        let req: ProtocolRequest = serde_json::from_str(r#"{"method":"tools/list"}"#).unwrap();
        assert_eq!(req, ProtocolRequest::ListTools);
    }

    #[test]
    fn call_without_arguments_defaults_to_null() {
        let req: ProtocolRequest =
            serde_json::from_str(r#"{"method":"tools/call","name":"echo"}"#).unwrap();
        assert!(matches!(req, ProtocolRequest::CallTool { arguments: Value::Null, .. }));
    }

    #[test]
    fn tool_result_serializes_flat() {
        let resp = ProtocolResponse::ToolResult(ToolCallResponse::error("bad"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["text"], "bad");
        assert_eq!(json["is_error"], true);
    }

    #[test]
    fn user_agent_formatting() {
        let client = ClientInfo {
            name: "inspector".into(),
            version: "1.2".into(),
        };
        assert_eq!(client.user_agent(), "inspector/1.2");
        let bare = ClientInfo {
            name: "cli".into(),
            version: String::new(),
        };
        assert_eq!(bare.user_agent(), "cli");
    }

    #[test]
    fn flush_error_joins_request_error() {
        let err = ProtocolError::Flush {
            flush: "disk full".into(),
            request: Some("tool not found: x".into()),
        };
        assert_eq!(
            err.to_string(),
            "flush failed: disk full (request error: tool not found: x)"
        );
        let err = ProtocolError::Flush {
            flush: "disk full".into(),
            request: None,
        };
        assert_eq!(err.to_string(), "flush failed: disk full");
    }
}
