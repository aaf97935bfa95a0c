//! Subcommand implementations. Each returns the text to print.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use canopy_ai::{
    CatalogStore, FileCatalogStore, Message, Permission, Role, Runner, SecurityClaims,
    SessionOptions, StaticServices,
};
use canopy_common::{CanopyError, SessionId};
use canopy_config::CanopyConfig;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::Command;
use crate::tools;

/// Instance the CLI records every session under.
pub const LOCAL_INSTANCE: &str = "local";

/// Longest message content shown by `history` before eliding.
const HISTORY_PREVIEW_CHARS: usize = 120;

pub struct Context {
    runner: Runner,
    store: Arc<FileCatalogStore>,
    claims: SecurityClaims,
}

impl Context {
    pub fn open(
        config: CanopyConfig,
        data_dir: PathBuf,
        user: &str,
        admin: bool,
    ) -> Result<Self, CanopyError> {
        let store = Arc::new(FileCatalogStore::open(&data_dir)?);
        info!(data_dir = %data_dir.display(), "session store opened");

        let services = StaticServices::new(store.clone())
            .with_instructions(config.session.ai_instructions.clone());
        let runner = Runner::new(tools::registry(), Arc::new(services), config);

        let mut claims = if admin {
            SecurityClaims::admin(user)
        } else {
            SecurityClaims::new(user)
        };
        for permission in [Permission::UseAi, Permission::ReadMetrics] {
            claims = claims.with_permission(permission);
        }

        Ok(Self {
            runner,
            store,
            claims,
        })
    }

    pub async fn run(&self, command: Command) -> Result<String, CanopyError> {
        match command {
            Command::Tools { json } => self.tools(json),
            Command::Call {
                tool,
                args,
                session,
            } => self.call(&tool, args.as_deref(), session).await,
            Command::History { session } => self.history(session).await,
            Command::Sessions { all } => self.sessions(all).await,
        }
    }

    fn tools(&self, json: bool) -> Result<String, CanopyError> {
        let specs = self.runner.registry().specs_for(&self.claims);
        if json {
            return serde_json::to_string_pretty(&specs)
                .map_err(|e| CanopyError::Other(format!("failed to encode tool specs: {e}")));
        }
        let mut out = String::new();
        for spec in specs {
            let _ = writeln!(out, "{:<16} {}", spec.name, spec.description);
        }
        Ok(out)
    }

    async fn call(
        &self,
        tool: &str,
        args: Option<&str>,
        session: Option<String>,
    ) -> Result<String, CanopyError> {
        let args: Value = match args {
            Some(text) => serde_json::from_str(text)
                .map_err(|e| CanopyError::Other(format!("--args is not valid JSON: {e}")))?,
            None => Value::Null,
        };

        let session = self
            .runner
            .session(SessionOptions {
                instance_id: LOCAL_INSTANCE.to_string(),
                session_id: session.map(SessionId::from),
                claims: self.claims.clone(),
                user_agent: format!("canopy-cli/{}", env!("CARGO_PKG_VERSION")),
            })
            .await?;

        let result = session.call_tool(Role::User, tool, &args).await;
        let flushed = session.flush().await;
        let result = result?;
        flushed?;

        debug!(session_id = %session.id(), tool, error = result.is_error(), "call finished");
        let result = result
            .into_result()
            .map_err(|err| CanopyError::Ai(format!("{tool} failed in session {}: {err}", session.id())))?;

        let output = match result.output() {
            Some(value) => serde_json::to_string_pretty(value)
                .unwrap_or_else(|_| result.result.content.clone()),
            None => result.result.content.clone(),
        };
        Ok(format!("session: {}\n{output}\n", session.id()))
    }

    async fn history(&self, session: String) -> Result<String, CanopyError> {
        let session = self
            .runner
            .session(SessionOptions {
                instance_id: LOCAL_INSTANCE.to_string(),
                session_id: Some(SessionId::from(session)),
                claims: self.claims.clone(),
                user_agent: String::new(),
            })
            .await?;

        let record = session.record();
        let mut out = String::new();
        let _ = writeln!(out, "session {} \"{}\"", record.id, record.title);
        let _ = writeln!(
            out,
            "owner {} | agent {} | updated {}",
            record.owner_id,
            if record.user_agent.is_empty() { "-" } else { record.user_agent.as_str() },
            record.updated_on.format("%Y-%m-%d %H:%M:%S")
        );
        out.push_str(&render_tree(&session.all_messages()));
        Ok(out)
    }

    async fn sessions(&self, all: bool) -> Result<String, CanopyError> {
        if all && !self.claims.admin {
            return Err(CanopyError::Other(
                "listing every user's sessions requires --admin".into(),
            ));
        }
        let owner = (!all).then_some(self.claims.user_id.as_str());
        let records = self.store.find_sessions(LOCAL_INSTANCE, owner).await?;

        let mut out = String::new();
        for record in records {
            let _ = writeln!(
                out,
                "{}  {}  {:<10} {}",
                record.id,
                record.updated_on.format("%Y-%m-%d %H:%M"),
                record.owner_id,
                record.title
            );
        }
        Ok(out)
    }
}

/// One line per message, indented by nesting depth.
fn render_tree(messages: &[Message]) -> String {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut out = String::new();
    for msg in messages {
        let level = msg
            .parent_id()
            .and_then(|parent| depth.get(parent))
            .map_or(0, |d| d + 1);
        depth.insert(&msg.id, level);

        let mut content: String = msg.content.chars().take(HISTORY_PREVIEW_CHARS).collect();
        if msg.content.chars().count() > HISTORY_PREVIEW_CHARS {
            content.push_str("...");
        }
        let content = content.replace('\n', " ");
        let tool = if msg.tool.is_empty() {
            String::new()
        } else {
            format!(" {}", msg.tool)
        };
        let _ = writeln!(
            out,
            "{:>4} {}{} {}{}: {}",
            msg.index,
            "  ".repeat(level),
            msg.role,
            msg.message_type,
            tool,
            content
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(dir: &tempfile::TempDir, user: &str, admin: bool) -> Context {
        Context::open(CanopyConfig::default(), dir.path().to_path_buf(), user, admin).unwrap()
    }

    fn session_id(output: &str) -> String {
        output
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("session: "))
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn call_then_history_shows_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, "alice", false);

        let out = ctx
            .run(Command::Call {
                tool: "echo".into(),
                args: Some(r#"{"greeting":"hi"}"#.into()),
                session: None,
            })
            .await
            .unwrap();
        assert!(out.contains("\"greeting\": \"hi\""));
        let id = session_id(&out);

        let history = ctx.run(Command::History { session: id.clone() }).await.unwrap();
        assert!(history.starts_with(&format!("session {id}")));
        assert!(history.contains("canopy-cli/"));
        assert!(history.contains("   0 user call echo: {\"greeting\":\"hi\"}"));
        assert!(history.contains("   1   tool result echo: {\"greeting\":\"hi\"}"));
    }

    #[tokio::test]
    async fn resumed_calls_extend_the_same_session() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, "alice", false);

        let first = ctx
            .run(Command::Call {
                tool: "session_info".into(),
                args: None,
                session: None,
            })
            .await
            .unwrap();
        assert!(first.contains("\"first_invocation\": true"));
        let id = session_id(&first);

        // A fresh context reads everything back from disk.
        let ctx = context(&dir, "alice", false);
        let second = ctx
            .run(Command::Call {
                tool: "session_info".into(),
                args: None,
                session: Some(id.clone()),
            })
            .await
            .unwrap();
        assert_eq!(session_id(&second), id);
        assert!(second.contains("\"first_invocation\": false"));
        assert!(second.contains("\"calls\": 2"));
        assert!(second.contains("\"messages\": 3"));
    }

    #[tokio::test]
    async fn completion_tools_report_missing_backend() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, "alice", false);

        let err = ctx
            .run(Command::Call {
                tool: "ask".into(),
                args: Some(r#"{"prompt":"What changed?"}"#.into()),
                session: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no AI service configured"));

        // The failed turn is still on disk, titled after the prompt.
        let listed = ctx.run(Command::Sessions { all: false }).await.unwrap();
        assert!(listed.contains("What changed?"));
    }

    #[tokio::test]
    async fn failed_tool_fails_the_command_but_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, "alice", false);

        let err = ctx
            .run(Command::Call {
                tool: "missing".into(),
                args: None,
                session: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(&err, CanopyError::Ai(msg) if msg.starts_with("missing failed in session")));
        assert!(err.to_string().contains("unknown tool"));

        let records = ctx.store.find_sessions(LOCAL_INSTANCE, Some("alice")).await.unwrap();
        assert_eq!(records.len(), 1);
        let history = ctx
            .run(Command::History {
                session: records[0].id.to_string(),
            })
            .await
            .unwrap();
        assert!(history.contains("   0 user call missing"));
        assert!(history.contains("   1   tool result missing"));
    }

    #[tokio::test]
    async fn project_instructions_come_from_session_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CanopyConfig::default();
        config.session.ai_instructions = "Prefer weekly grain.".into();
        config.protocol.instructions = "Connect over stdio.".into();
        let ctx = Context::open(config, dir.path().to_path_buf(), "alice", false).unwrap();

        // No AI backend, so the question fails after its prompts are logged.
        ctx.run(Command::Call {
            tool: "ask".into(),
            args: Some(r#"{"prompt":"Trend?"}"#.into()),
            session: None,
        })
        .await
        .unwrap_err();

        let records = ctx.store.find_sessions(LOCAL_INSTANCE, Some("alice")).await.unwrap();
        let history = ctx
            .run(Command::History {
                session: records[0].id.to_string(),
            })
            .await
            .unwrap();
        assert!(history.contains("system prompt: Prefer weekly grain."));
        assert!(!history.contains("Connect over stdio."));
    }

    #[tokio::test]
    async fn invalid_json_arguments_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, "alice", false);

        let err = ctx
            .run(Command::Call {
                tool: "echo".into(),
                args: Some("{oops".into()),
                session: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--args is not valid JSON"));
    }

    #[tokio::test]
    async fn sessions_are_scoped_to_their_owner() {
        let dir = tempfile::tempdir().unwrap();
        for user in ["alice", "bob"] {
            context(&dir, user, false)
                .run(Command::Call {
                    tool: "echo".into(),
                    args: None,
                    session: None,
                })
                .await
                .unwrap();
        }

        let alice = context(&dir, "alice", false);
        let listed = alice.run(Command::Sessions { all: false }).await.unwrap();
        assert_eq!(listed.lines().count(), 1);
        assert!(listed.contains("alice"));
        assert!(alice.run(Command::Sessions { all: true }).await.is_err());

        let admin = context(&dir, "root", true);
        let listed = admin.run(Command::Sessions { all: true }).await.unwrap();
        assert_eq!(listed.lines().count(), 2);
    }

    #[tokio::test]
    async fn history_of_foreign_session_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let out = context(&dir, "alice", false)
            .run(Command::Call {
                tool: "echo".into(),
                args: None,
                session: None,
            })
            .await
            .unwrap();
        let id = session_id(&out);

        let err = context(&dir, "bob", false)
            .run(Command::History { session: id.clone() })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access denied"));

        assert!(context(&dir, "root", true)
            .run(Command::History { session: id })
            .await
            .is_ok());
    }

    #[test]
    fn tools_listing_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, "alice", false);
        let out = ctx.tools(false).unwrap();
        let names: Vec<&str> = out.lines().filter_map(|l| l.split_whitespace().next()).collect();
        assert_eq!(names, vec!["ask", "echo", "session_info"]);
    }
}
