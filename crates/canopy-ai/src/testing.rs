//! Fixtures shared by the crate's tests: a scripted LLM, a few tools,
//! and a runner wired to an in-memory catalog.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use canopy_config::CanopyConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::StaticServices;
use crate::claims::{Permission, SecurityClaims};
use crate::message::{CompletionMessage, ContentBlock, Role, ToolCall};
use crate::runner::{Runner, SessionOptions};
use crate::service::{AiService, ToolDescriptor};
use crate::session::Session;
use crate::store::MemoryCatalogStore;
use crate::tools::{Tool, ToolRegistry, ToolSpec};
use crate::AiError;

/// What the scripted service was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<CompletionMessage>,
    pub tools: Vec<String>,
    pub output_schema: Option<Value>,
}

/// An LLM stand-in that replays queued responses in order.
#[derive(Default)]
pub struct ScriptedAiService {
    responses: Mutex<VecDeque<CompletionMessage>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedAiService {
    pub fn new(responses: impl IntoIterator<Item = CompletionMessage>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiService for ScriptedAiService {
    async fn complete(
        &self,
        messages: &[CompletionMessage],
        tools: &[ToolDescriptor],
        output_schema: Option<&Value>,
    ) -> Result<CompletionMessage, AiError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            output_schema: output_schema.cloned(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AiError::Backend("script exhausted".into()))
    }
}

pub fn answer(text: &str) -> CompletionMessage {
    CompletionMessage::text(Role::Assistant, text)
}

pub fn tool_request(name: &str, input: Value) -> CompletionMessage {
    CompletionMessage {
        role: Role::Assistant,
        content: vec![
            ContentBlock::Text(format!("calling {name}")),
            ContentBlock::ToolCall(ToolCall {
                id: format!("llm-{name}"),
                name: name.to_string(),
                input,
            }),
        ],
    }
}

/// Returns its arguments unchanged.
pub struct Echo;

#[async_trait]
impl Tool for Echo {
    type Args = Value;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("echo", "Returns its arguments")
    }

    async fn handle(&self, _session: &Session, args: Value) -> Result<Value, AiError> {
        Ok(args)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListMetricsArgs {
    /// Only metrics whose name contains this text.
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ListMetricsOutput {
    pub count: usize,
}

/// Lists metrics of an empty project.
pub struct ListMetrics;

#[async_trait]
impl Tool for ListMetrics {
    type Args = ListMetricsArgs;
    type Output = ListMetricsOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("list_metrics", "List the project's metrics").with_title("List metrics")
    }

    fn check_access(&self, claims: &SecurityClaims) -> bool {
        claims.can(Permission::ReadMetrics)
    }

    async fn handle(
        &self,
        _session: &Session,
        _args: ListMetricsArgs,
    ) -> Result<ListMetricsOutput, AiError> {
        Ok(ListMetricsOutput { count: 0 })
    }
}

/// Panics on every call.
pub struct Explode;

#[async_trait]
impl Tool for Explode {
    type Args = Value;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("explode", "Always panics")
    }

    async fn handle(&self, _session: &Session, _args: Value) -> Result<Value, AiError> {
        panic!("boom");
    }
}

/// Fails with a caller error.
pub struct Reject;

#[async_trait]
impl Tool for Reject {
    type Args = Value;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("reject", "Always fails")
    }

    async fn handle(&self, _session: &Session, _args: Value) -> Result<Value, AiError> {
        Err(AiError::tool("metric \"revenue\" does not exist"))
    }
}

/// An agent that answers a question with one completion over its
/// default context, offering `list_metrics`.
pub struct Analyst;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalystArgs {
    pub prompt: String,
}

#[async_trait]
impl Tool for Analyst {
    type Args = AnalystArgs;
    type Output = String;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("analyst", "Answers questions about metrics")
    }

    async fn handle(&self, session: &Session, args: AnalystArgs) -> Result<String, AiError> {
        session.add_message(
            Role::System,
            crate::message::MessageType::Prompt,
            "",
            crate::message::ContentType::Text,
            "You are a data analyst.",
        );
        session.add_message(
            Role::User,
            crate::message::MessageType::Prompt,
            "",
            crate::message::ContentType::Text,
            args.prompt,
        );
        let opts = crate::session::CompleteOptions::new(session.default_completion_messages())
            .with_tools(["list_metrics"])
            .unwrapped();
        session.complete::<String>("analyst", opts).await
    }
}

pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Echo)
        .register(ListMetrics)
        .register(Explode)
        .register(Reject)
        .register(Analyst);
    registry
}

pub struct Fixture {
    pub runner: Runner,
    pub store: MemoryCatalogStore,
}

pub fn fixture(ai: Option<Arc<ScriptedAiService>>) -> Fixture {
    fixture_with(ai, CanopyConfig::default())
}

pub fn fixture_with(ai: Option<Arc<ScriptedAiService>>, config: CanopyConfig) -> Fixture {
    let store = MemoryCatalogStore::new();
    let mut services = StaticServices::new(Arc::new(store.clone()));
    if let Some(ai) = ai {
        services = services.with_ai(ai);
    }
    Fixture {
        runner: Runner::new(registry(), Arc::new(services), config),
        store,
    }
}

pub fn analyst_claims() -> SecurityClaims {
    SecurityClaims::new("alice").with_permission(Permission::ReadMetrics)
}

impl Fixture {
    pub async fn session(&self) -> Session {
        self.runner
            .session(SessionOptions {
                instance_id: "inst".into(),
                claims: analyst_claims(),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}
