//! Validation for session and protocol sections.

use crate::schema::CanopyConfig;

use super::helpers::validate_range;

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &CanopyConfig) {
    validate_range(
        errors,
        "session.flush_grace_ms",
        config.session.flush_grace_ms,
        100,
        60_000,
    );
    validate_range(
        errors,
        "session.subscriber_capacity",
        config.session.subscriber_capacity as u64,
        1,
        65_536,
    );
    validate_range(
        errors,
        "session.title_max_chars",
        config.session.title_max_chars as u64,
        10,
        500,
    );
}

pub(crate) fn validate_protocol(errors: &mut Vec<String>, config: &CanopyConfig) {
    if config.protocol.server_name.trim().is_empty() {
        errors.push("protocol.server_name must not be empty".into());
    }
}
