//! The runner ties the tool registry to the runtime services and opens
//! sessions against them.

use std::sync::Arc;

use canopy_common::{SessionId, StoreError};
use canopy_config::CanopyConfig;
use tracing::info;

use crate::backends::RuntimeServices;
use crate::claims::SecurityClaims;
use crate::protocol::{ProtocolServer, ServerInfo, SessionProtocol};
use crate::session::{BaseSession, Session};
use crate::store::SessionRecord;
use crate::tools::ToolRegistry;
use crate::AiError;

pub(crate) struct RunnerShared {
    pub(crate) registry: ToolRegistry,
    pub(crate) services: Arc<dyn RuntimeServices>,
    pub(crate) config: CanopyConfig,
}

/// Entry point for opening sessions.
#[derive(Clone)]
pub struct Runner {
    shared: Arc<RunnerShared>,
}

/// Parameters for opening a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub instance_id: String,
    /// Resume an existing session. A new one is created when unset.
    pub session_id: Option<SessionId>,
    pub claims: SecurityClaims,
    /// Client description recorded on the session. Empty = keep current.
    pub user_agent: String,
}

impl Runner {
    pub fn new(
        registry: ToolRegistry,
        services: Arc<dyn RuntimeServices>,
        config: CanopyConfig,
    ) -> Self {
        Self {
            shared: Arc::new(RunnerShared {
                registry,
                services,
                config,
            }),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &CanopyConfig {
        &self.shared.config
    }

    /// Open a session: resume it from the catalog when an id is given,
    /// otherwise start a fresh one that is persisted on first flush.
    pub async fn session(&self, opts: SessionOptions) -> Result<Session, AiError> {
        let instance = self.shared.services.instance(&opts.instance_id).await?;

        let (mut record, messages, persisted) = match &opts.session_id {
            Some(id) => {
                let catalog = self.shared.services.catalog(&opts.instance_id).await?;
                let record = catalog.find_session(id).await?;
                if record.instance_id != opts.instance_id {
                    return Err(StoreError::NotFound(format!(
                        "session {id} in instance {}",
                        opts.instance_id
                    ))
                    .into());
                }
                if record.owner_id != opts.claims.user_id && !opts.claims.admin {
                    return Err(AiError::AccessDenied(format!("session {id}")));
                }
                let messages = catalog.find_messages(id).await?;
                (record, messages, true)
            }
            None => (
                SessionRecord::new(
                    SessionId::new(),
                    opts.instance_id.clone(),
                    opts.claims.user_id.clone(),
                ),
                Vec::new(),
                false,
            ),
        };

        let mut dirty = !persisted;
        if !opts.user_agent.is_empty() && record.user_agent != opts.user_agent {
            record.user_agent = opts.user_agent.clone();
            dirty = true;
        }

        info!(
            session_id = %record.id,
            instance_id = %opts.instance_id,
            resumed = persisted,
            messages = messages.len(),
            "session opened"
        );

        let base = BaseSession::new(
            self.shared.clone(),
            record,
            messages,
            persisted,
            dirty,
            opts.claims,
            instance.ai_instructions,
        );
        Ok(Session::root(Arc::new(base)))
    }

    /// A protocol server exposing the tools this session's caller may use.
    pub fn protocol(&self, session: &Session) -> SessionProtocol {
        let config = &self.shared.config.protocol;
        let info = ServerInfo {
            name: config.server_name.clone(),
            version: config.server_version.clone(),
            instructions: (!config.instructions.is_empty()).then(|| config.instructions.clone()),
        };
        let mut server = ProtocolServer::new(info);
        for tool in self.shared.registry.iter() {
            if tool.check_access(session.claims()) {
                tool.install_into(&mut server);
            }
        }
        SessionProtocol::new(session.clone(), server)
    }
}
