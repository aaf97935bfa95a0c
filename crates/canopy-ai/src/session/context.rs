//! Call-tree reconstruction over a session's flat message log.

use std::collections::HashSet;

use tracing::warn;

use crate::message::{CompletionMessage, Message, MessageType, Role};

/// Parent links followed before giving up on finding a root.
const MAX_ROOT_HOPS: usize = 100;

pub(crate) fn message_by_id<'a>(messages: &'a [Message], id: &str) -> Option<&'a Message> {
    messages.iter().find(|m| m.id == id)
}

pub(crate) fn calls(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.is_root()).collect()
}

pub(crate) fn messages_by_call<'a>(messages: &'a [Message], id: &str, nested: bool) -> Vec<&'a Message> {
    let Some(start) = messages.iter().position(|m| m.id == id) else {
        return Vec::new();
    };

    let mut out = vec![&messages[start]];
    for msg in &messages[start + 1..] {
        if msg.is_root() {
            break;
        }
        if nested || msg.parent_id() == Some(id) {
            out.push(msg);
        }
    }
    out
}

pub(crate) fn root_id(messages: &[Message], from: &str) -> Option<String> {
    let mut current = from.to_string();
    for _ in 0..MAX_ROOT_HOPS {
        let Some(msg) = message_by_id(messages, &current) else {
            warn!(message_id = %current, "parent chain references a missing message");
            return None;
        };
        match msg.parent_id() {
            Some(parent) => current = parent.to_string(),
            None => return Some(current),
        }
    }
    warn!(message_id = %from, "no root found within {MAX_ROOT_HOPS} hops");
    Some(current)
}

fn is_user_prompt(msg: &Message) -> bool {
    msg.role == Role::User && msg.message_type == MessageType::Prompt
}

/// Select what a completion running under `current_call` sees:
/// - the latest system prompt of the current root call
/// - user prompts and root-level results of earlier root calls
/// - user prompts of the current root call
/// - call/result pairs directly under `current_call`
pub(crate) fn default_completion_messages<'a>(
    messages: &'a [Message],
    current_call: &str,
) -> Vec<&'a Message> {
    let Some(root) = root_id(messages, current_call) else {
        return Vec::new();
    };

    let mut previous = Vec::new();
    let mut prior_root: Option<&str> = None;
    for msg in messages {
        if msg.id == root {
            break;
        }
        if msg.is_root() {
            prior_root = Some(&msg.id);
        } else if is_user_prompt(msg) {
            previous.push(msg);
        } else if msg.message_type == MessageType::Result && msg.parent_id() == prior_root {
            previous.push(msg);
        }
    }

    let root_messages = messages_by_call(messages, &root, true);

    let system_prompt = root_messages
        .iter()
        .rev()
        .find(|m| m.role == Role::System && m.message_type == MessageType::Prompt)
        .copied();

    let user_prompts = root_messages.iter().copied().filter(|m| is_user_prompt(m));

    let mut current = Vec::new();
    let mut latest_call: Option<&str> = None;
    for msg in &root_messages {
        if msg.parent_id() == Some(current_call) && msg.message_type == MessageType::Call {
            latest_call = Some(&msg.id);
            current.push(*msg);
        } else if latest_call.is_some()
            && msg.parent_id() == latest_call
            && msg.message_type == MessageType::Result
        {
            current.push(*msg);
        }
    }

    system_prompt
        .into_iter()
        .chain(previous)
        .chain(user_prompts)
        .chain(current)
        .collect()
}

/// Export `selected` for an LLM, rendering results of root calls in `log`
/// as assistant text.
pub(crate) fn completion_messages(log: &[Message], selected: &[Message]) -> Vec<CompletionMessage> {
    let roots: HashSet<&str> = log
        .iter()
        .filter(|m| m.is_root())
        .map(|m| m.id.as_str())
        .collect();

    selected
        .iter()
        .map(|msg| {
            let root_result = msg.message_type == MessageType::Result
                && msg.parent_id().is_some_and(|p| roots.contains(p));
            if root_result {
                msg.to_assistant_text()
            } else {
                msg.to_completion_message()
            }
        })
        .collect()
}
