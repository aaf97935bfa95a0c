//! Typed tools and the registry that erases them to JSON handlers.
//!
//! A tool declares its argument and output types; the registry derives
//! JSON Schemas from them at registration time and wraps the handler
//! behind a payload-level function the call mechanism can drive.

mod registry;
pub mod schema;

pub use registry::{RegisteredTool, ToolRegistry};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claims::SecurityClaims;
use crate::session::Session;
use crate::AiError;

/// Declarative description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub description: String,
    /// Derived from the tool's argument type when not supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// Derived from the tool's output type when not supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Free-form metadata passed through to protocol clients.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: description.into(),
            input_schema: None,
            output_schema: None,
            meta: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema + Send + 'static;
    type Output: Serialize + JsonSchema + Send + 'static;

    fn spec(&self) -> ToolSpec;

    /// Whether a caller with these claims may run the tool.
    fn check_access(&self, _claims: &SecurityClaims) -> bool {
        true
    }

    async fn handle(&self, session: &Session, args: Self::Args) -> Result<Self::Output, AiError>;
}
