//! Reading `config.toml` from disk, seeding the platform default on first run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use canopy_common::ConfigError;
use tracing::{debug, info};

use crate::schema::CanopyConfig;

use super::template::default_config_toml;

const APP_DIR: &str = "canopy";
const CONFIG_FILE: &str = "config.toml";

/// Where the config lives when no path is given.
///
/// `~/.config/canopy/config.toml` on Linux,
/// `~/Library/Application Support/canopy/config.toml` on macOS.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Parse a TOML config file. Missing keys take their defaults; range
/// checks are left to [`crate::validation::validate`].
pub fn load_from_path(path: &Path) -> Result<CanopyConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };

    let config = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load the config at [`default_config_path`], writing the commented
/// template there first when the file does not exist yet.
pub fn load_default() -> Result<CanopyConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(CanopyConfig::default())
        }
        other => other,
    }
}

/// Write the commented template to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let write_failed =
        |e: io::Error| ConfigError::ParseError(format!("cannot write {}: {e}", path.display()));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }
    fs::write(path, default_config_toml()).map_err(write_failed)?;
    info!(path = %path.display(), "wrote default config");
    Ok(())
}
