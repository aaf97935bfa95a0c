//! Validation for the completion loop and its truncation window.

use crate::schema::CanopyConfig;

use super::helpers::validate_range;

pub(crate) fn validate_completion(errors: &mut Vec<String>, config: &CanopyConfig) {
    validate_range(
        errors,
        "completion.max_iterations",
        config.completion.max_iterations as u64,
        1,
        50,
    );
}

/// The kept head and tail must leave room for at least one omitted
/// message, otherwise truncation would not shorten anything.
pub(crate) fn validate_truncation(errors: &mut Vec<String>, config: &CanopyConfig) {
    let t = &config.completion.truncation;
    if t.max_messages == 0 {
        errors.push("completion.truncation.max_messages must be greater than 0".into());
    }
    if t.keep_first + t.keep_last >= t.max_messages {
        errors.push(format!(
            "completion.truncation.keep_first + keep_last ({}) must be less than max_messages ({})",
            t.keep_first + t.keep_last,
            t.max_messages
        ));
    }
}
