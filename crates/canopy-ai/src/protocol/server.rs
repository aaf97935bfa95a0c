use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ProtocolError, ProtocolRequest, ProtocolResponse, ServerInfo, ToolCallResponse};
use crate::session::Session;
use crate::tools::ToolSpec;

/// Per-request state handed to tool handlers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session: Option<Session>,
}

impl RequestContext {
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }
}

pub type ToolHandler = Arc<
    dyn Fn(RequestContext, Value) -> BoxFuture<'static, Result<ToolCallResponse, ProtocolError>>
        + Send
        + Sync,
>;

/// Dispatches protocol requests to installed tool handlers.
pub struct ProtocolServer {
    info: ServerInfo,
    tools: BTreeMap<String, (ToolSpec, ToolHandler)>,
}

impl ProtocolServer {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            tools: BTreeMap::new(),
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn add_tool(&mut self, spec: ToolSpec, handler: ToolHandler) {
        self.tools.insert(spec.name.clone(), (spec, handler));
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn list_tools(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|(spec, _)| spec.clone()).collect()
    }

    pub async fn handle(
        &self,
        ctx: RequestContext,
        request: ProtocolRequest,
    ) -> Result<ProtocolResponse, ProtocolError> {
        match request {
            ProtocolRequest::Initialize { client } => {
                debug!(client = %client.user_agent(), "protocol client initialized");
                Ok(ProtocolResponse::Initialized {
                    server: self.info.clone(),
                })
            }
            ProtocolRequest::ListTools => Ok(ProtocolResponse::Tools {
                tools: self.list_tools(),
            }),
            ProtocolRequest::CallTool { name, arguments } => {
                let (_, handler) = self
                    .tools
                    .get(&name)
                    .ok_or_else(|| ProtocolError::ToolNotFound(name.clone()))?;
                let response = handler(ctx, arguments).await?;
                Ok(ProtocolResponse::ToolResult(response))
            }
        }
    }
}

impl fmt::Debug for ProtocolServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolServer")
            .field("info", &self.info)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// A protocol server bound to one session. Every request runs against
/// that session and is followed by a flush.
#[derive(Debug)]
pub struct SessionProtocol {
    session: Session,
    server: ProtocolServer,
}

impl SessionProtocol {
    pub(crate) fn new(session: Session, server: ProtocolServer) -> Self {
        Self { session, server }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn server(&self) -> &ProtocolServer {
        &self.server
    }

    pub async fn handle(&self, request: ProtocolRequest) -> Result<ProtocolResponse, ProtocolError> {
        if let ProtocolRequest::Initialize { client } = &request {
            if !client.name.is_empty() {
                self.session.update_user_agent(client.user_agent());
            }
        }

        let ctx = RequestContext::with_session(self.session.clone());
        let result = self.server.handle(ctx, request).await;

        match self.session.flush().await {
            Ok(()) => result,
            Err(flush) => {
                warn!(session_id = %self.session.id(), "flush after protocol request failed: {flush}");
                Err(ProtocolError::Flush {
                    flush: flush.to_string(),
                    request: result.err().map(|e| e.to_string()),
                })
            }
        }
    }
}
