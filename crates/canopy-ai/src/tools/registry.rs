use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{schema, Tool, ToolSpec};
use crate::claims::SecurityClaims;
use crate::protocol::{self, ProtocolServer, RequestContext};
use crate::session::Session;
use crate::AiError;

type AccessCheck = Arc<dyn Fn(&SecurityClaims) -> bool + Send + Sync>;
type JsonHandler = Arc<dyn Fn(Session, Value) -> BoxFuture<'static, Result<Value, AiError>> + Send + Sync>;
type Installer = Arc<dyn Fn(&mut ProtocolServer) + Send + Sync>;

/// A tool with its types erased to JSON in and JSON out.
#[derive(Clone)]
pub struct RegisteredTool {
    spec: ToolSpec,
    access: AccessCheck,
    handler: JsonHandler,
    install: Installer,
}

impl RegisteredTool {
    fn new<T: Tool>(tool: T) -> Self {
        let mut spec = tool.spec();
        if spec.input_schema.is_none() {
            spec.input_schema = Some(schema::input_schema::<T::Args>());
        }
        if spec.output_schema.is_none() {
            spec.output_schema = schema::output_schema::<T::Output>();
        }

        let tool = Arc::new(tool);

        let access: AccessCheck = {
            let tool = tool.clone();
            Arc::new(move |claims: &SecurityClaims| tool.check_access(claims))
        };

        let handler: JsonHandler = {
            let name = spec.name.clone();
            Arc::new(move |session: Session, input: Value| {
                let tool = tool.clone();
                let name = name.clone();
                async move {
                    let args: T::Args = decode_args(&name, input)?;
                    let output = tool.handle(&session, args).await?;
                    serde_json::to_value(output).map_err(|e| {
                        AiError::Serialization(format!("failed to serialize {name} result: {e}"))
                    })
                }
                .boxed()
            })
        };

        let install: Installer = {
            let spec = spec.clone();
            Arc::new(move |server: &mut ProtocolServer| {
                let name = spec.name.clone();
                let structured = spec.output_schema.is_some();
                server.add_tool(
                    spec.clone(),
                    Arc::new(move |ctx: RequestContext, arguments: Value| {
                        let name = name.clone();
                        async move {
                            protocol::call_through_session(ctx, &name, arguments, structured).await
                        }
                        .boxed()
                    }),
                );
            })
        };

        Self {
            spec,
            access,
            handler,
            install,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn check_access(&self, claims: &SecurityClaims) -> bool {
        (self.access)(claims)
    }

    /// Run the handler on a JSON payload. Malformed payloads are caller
    /// errors.
    pub async fn invoke(&self, session: Session, input: Value) -> Result<Value, AiError> {
        (self.handler)(session, input).await
    }

    /// Install a request handler for this tool into a protocol server.
    pub fn install_into(&self, server: &mut ProtocolServer) {
        (self.install)(server)
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.spec.name)
            .finish()
    }
}

/// A missing payload is treated as an empty argument object, unless the
/// argument type itself accepts null.
fn decode_args<A: DeserializeOwned>(tool: &str, input: Value) -> Result<A, AiError> {
    let decoded = match input {
        Value::Null => serde_json::from_value(Value::Null)
            .or_else(|_| serde_json::from_value(Value::Object(Map::new()))),
        other => serde_json::from_value(other),
    };
    decoded.map_err(|e| AiError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Tools known to a runner, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<T: Tool>(&mut self, tool: T) -> &mut Self {
        let registered = RegisteredTool::new(tool);
        let name = registered.name().to_string();
        if self.tools.insert(name.clone(), registered).is_some() {
            warn!(tool = %name, "tool registered twice, replacing earlier registration");
        } else {
            debug!(tool = %name, "tool registered");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Specs of the tools these claims may use.
    pub fn specs_for(&self, claims: &SecurityClaims) -> Vec<&ToolSpec> {
        self.tools
            .values()
            .filter(|tool| tool.check_access(claims))
            .map(RegisteredTool::spec)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}
