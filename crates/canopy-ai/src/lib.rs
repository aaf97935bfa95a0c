//! Orchestration core for Canopy.
//!
//! Provides the pieces that turn a prompt into a durable tree of tool
//! calls and LLM completions:
//! - Typed tool registry with JSON Schema derivation
//! - Sessions holding an append-only, parent-linked message log
//! - A call mechanism with panic containment and cancellation
//! - The multi-turn LLM tool-calling loop with context truncation
//! - Protocol exposure of the registered tools to external clients

pub mod backends;
pub mod claims;
pub mod filter;
pub mod message;
pub mod protocol;
pub mod runner;
pub mod service;
pub mod session;
pub mod store;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

use canopy_common::{CanopyError, StoreError};

pub use backends::{InstanceInfo, Lease, RuntimeServices, StaticServices};
pub use claims::{Permission, SecurityClaims};
pub use filter::MessageFilter;
pub use message::{
    CompletionMessage, ContentBlock, ContentType, Message, MessageType, Role, ToolCall,
    ToolResult,
};
pub use protocol::{ProtocolError, ProtocolServer, SessionProtocol};
pub use runner::{Runner, SessionOptions};
pub use service::{AiService, ToolDescriptor};
pub use session::{CallResult, CompleteOptions, Session};
pub use store::{CatalogStore, FileCatalogStore, MemoryCatalogStore, SessionRecord};
pub use tools::{RegisteredTool, Tool, ToolRegistry, ToolSpec};

/// Errors produced by tool calls, completions, and session bookkeeping.
///
/// Caller errors (bad arguments, unknown tools, denied access, handler
/// failures) are recorded verbatim as error results. `Internal` marks a
/// contained panic and `Cancelled` aborts bookkeeping entirely.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("access denied to {0}")]
    AccessDenied(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{0}")]
    Tool(String),

    #[error("{message}")]
    Internal { message: String, backtrace: String },

    #[error("cancelled")]
    Cancelled,

    #[error("completion failed: {0}")]
    Completion(String),

    #[error("unsupported output type: {0}")]
    UnsupportedOutput(String),

    #[error("invalid completion output: {0}")]
    InvalidOutput(String),

    #[error("no final result after {0} iterations")]
    NoFinalResult(usize),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("backend error: {0}")]
    Backend(String),
}

impl AiError {
    /// Shorthand for a handler-level failure.
    pub fn tool(message: impl Into<String>) -> Self {
        AiError::Tool(message.into())
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, AiError::Internal { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AiError::Cancelled)
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Serialization(err.to_string())
    }
}

impl From<AiError> for CanopyError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Store(e) => CanopyError::Store(e),
            other => CanopyError::Ai(other.to_string()),
        }
    }
}
