//! Protocol server identity settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub server_name: String,
    pub server_version: String,
    /// Usage instructions handed to clients at handshake. Empty = none.
    pub instructions: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            server_name: "canopy".into(),
            server_version: env!("CARGO_PKG_VERSION").into(),
            instructions: String::new(),
        }
    }
}
