//! Built-in tools shipped with the CLI.

use async_trait::async_trait;
use canopy_ai::{
    AiError, CompleteOptions, ContentType, MessageFilter, MessageType, Permission, Role,
    SecurityClaims, Session, Tool, ToolRegistry, ToolSpec,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Echo).register(SessionInfo).register(Ask);
    registry
}

/// Returns its arguments unchanged.
pub struct Echo;

#[async_trait]
impl Tool for Echo {
    type Args = Value;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("echo", "Return the arguments unchanged").with_title("Echo")
    }

    async fn handle(&self, _session: &Session, args: Value) -> Result<Value, AiError> {
        Ok(args)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SessionInfoArgs {}

#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SessionInfoOutput {
    pub session_id: String,
    pub title: String,
    pub user_agent: String,
    /// Messages logged so far, including this call.
    pub messages: usize,
    /// Top-level calls made in the session, including this one.
    pub calls: usize,
    /// True when this is the first time the tool runs in the session.
    pub first_invocation: bool,
}

/// Describes the session it runs in.
pub struct SessionInfo;

#[async_trait]
impl Tool for SessionInfo {
    type Args = SessionInfoArgs;
    type Output = SessionInfoOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("session_info", "Describe the current session")
            .with_title("Session info")
    }

    async fn handle(
        &self,
        session: &Session,
        _args: SessionInfoArgs,
    ) -> Result<SessionInfoOutput, AiError> {
        let record = session.record();
        let invocations = session
            .messages(&[
                MessageFilter::Type(MessageType::Call),
                MessageFilter::tool("session_info"),
            ])
            .len();
        Ok(SessionInfoOutput {
            session_id: record.id.to_string(),
            title: record.title,
            user_agent: record.user_agent,
            messages: session.all_messages().len(),
            calls: session.calls().len(),
            first_invocation: invocations == 1,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskArgs {
    /// The question to put to the model.
    pub prompt: String,
}

/// Answers a question with the model, using earlier turns as context.
pub struct Ask;

#[async_trait]
impl Tool for Ask {
    type Args = AskArgs;
    type Output = String;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("ask", "Ask the model a question").with_title("Ask")
    }

    fn check_access(&self, claims: &SecurityClaims) -> bool {
        claims.can(Permission::UseAi)
    }

    async fn handle(&self, session: &Session, args: AskArgs) -> Result<String, AiError> {
        if !session.project_instructions().is_empty() {
            session.add_message(
                Role::System,
                MessageType::Prompt,
                "",
                ContentType::Text,
                session.project_instructions(),
            );
        }
        session.add_message(
            Role::User,
            MessageType::Prompt,
            "",
            ContentType::Text,
            args.prompt,
        );
        let opts = CompleteOptions::new(session.default_completion_messages())
            .with_tools(["session_info"])
            .unwrapped();
        session.complete("ask", opts).await
    }
}
