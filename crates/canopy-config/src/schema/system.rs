//! System configuration types: storage and logging.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Catalog storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding session records and message logs.
    /// Empty = `<platform data dir>/canopy`.
    pub data_dir: String,
}

impl StoreConfig {
    /// Resolve the effective data directory.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        if self.data_dir.is_empty() {
            dirs::data_dir().map(|dir| dir.join("canopy"))
        } else {
            Some(PathBuf::from(&self.data_dir))
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Render as a `tracing` filter directive for the canopy crates.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "canopy=debug,canopy_ai=debug",
            LogLevel::Info => "canopy=info,canopy_ai=info",
            LogLevel::Warn => "canopy=warn,canopy_ai=warn",
            LogLevel::Error => "canopy=error,canopy_ai=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
