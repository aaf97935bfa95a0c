//! Configuration schema types for Canopy.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the runtime ships with.

mod completion;
mod protocol;
mod session;
mod system;

pub use completion::*;
pub use protocol::*;
pub use session::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Canopy.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyConfig {
    pub completion: CompletionConfig,
    pub session: SessionConfig,
    pub protocol: ProtocolConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CanopyConfig::default();
        assert_eq!(config.completion.max_iterations, 5);
        assert_eq!(config.completion.truncation.max_messages, 20);
        assert_eq!(config.completion.truncation.keep_first, 3);
        assert_eq!(config.completion.truncation.keep_last, 16);
        assert_eq!(config.session.flush_grace_ms, 5000);
        assert_eq!(config.protocol.server_name, "canopy");
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn project_instructions_are_separate_from_protocol_instructions() {
        let config: CanopyConfig = toml::from_str(
            r#"
[session]
ai_instructions = "Prefer weekly grain."
"#,
        )
        .unwrap();
        assert_eq!(config.session.ai_instructions, "Prefer weekly grain.");
        assert!(config.protocol.instructions.is_empty());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: CanopyConfig = toml::from_str(
            r#"
[completion]
max_iterations = 8
"#,
        )
        .unwrap();
        assert_eq!(config.completion.max_iterations, 8);
        assert_eq!(config.completion.truncation.keep_last, 16);
        assert_eq!(config.session.subscriber_capacity, 256);
    }

    #[test]
    fn empty_toml_is_default() {
        let config: CanopyConfig = toml::from_str("").unwrap();
        assert_eq!(config, CanopyConfig::default());
    }
}
