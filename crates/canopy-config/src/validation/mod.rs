//! Full configuration validation.
//!
//! Each section has its own validator; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod completion;
mod helpers;
mod session;


use crate::schema::CanopyConfig;
use canopy_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &CanopyConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    completion::validate_completion(&mut errors, config);
    completion::validate_truncation(&mut errors, config);
    session::validate_session(&mut errors, config);
    session::validate_protocol(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
