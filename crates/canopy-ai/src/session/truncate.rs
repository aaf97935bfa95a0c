//! Bounding the message list sent to the LLM.

use canopy_config::TruncationConfig;

use crate::message::{CompletionMessage, Role};

/// Keep the first and last messages of an over-long list and collapse
/// the middle into one system note. Lists within the limit are returned
/// unchanged.
pub fn truncate_messages(
    messages: &[CompletionMessage],
    config: &TruncationConfig,
) -> Vec<CompletionMessage> {
    if messages.len() <= config.max_messages
        || config.keep_first + config.keep_last >= messages.len()
    {
        return messages.to_vec();
    }

    let omitted = messages.len() - config.keep_first - config.keep_last;
    let mut out = Vec::with_capacity(config.keep_first + config.keep_last + 1);
    out.extend_from_slice(&messages[..config.keep_first]);
    out.push(CompletionMessage::text(
        Role::System,
        format!("... [{omitted} messages omitted for brevity] ..."),
    ));
    out.extend_from_slice(&messages[messages.len() - config.keep_last..]);
    out
}
