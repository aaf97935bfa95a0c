//! Composable predicates over session messages.

use crate::message::{Message, MessageType, Role};

#[derive(Debug, Clone, PartialEq)]
pub enum MessageFilter {
    Id(String),
    /// Messages whose parent is the given id. `None` matches root messages.
    Parent(Option<String>),
    Root,
    Type(MessageType),
    Role(Role),
    Tool(String),
    All(Vec<MessageFilter>),
    Any(Vec<MessageFilter>),
    Not(Box<MessageFilter>),
}

impl MessageFilter {
    pub fn parent(id: impl Into<String>) -> Self {
        MessageFilter::Parent(Some(id.into()))
    }

    pub fn tool(name: impl Into<String>) -> Self {
        MessageFilter::Tool(name.into())
    }

    pub fn negate(self) -> Self {
        MessageFilter::Not(Box::new(self))
    }

    pub fn matches(&self, msg: &Message) -> bool {
        match self {
            MessageFilter::Id(id) => msg.id == *id,
            MessageFilter::Parent(parent) => msg.parent_id == *parent,
            MessageFilter::Root => msg.is_root(),
            MessageFilter::Type(t) => msg.message_type == *t,
            MessageFilter::Role(r) => msg.role == *r,
            MessageFilter::Tool(name) => msg.tool == *name,
            MessageFilter::All(filters) => filters.iter().all(|f| f.matches(msg)),
            MessageFilter::Any(filters) => filters.iter().any(|f| f.matches(msg)),
            MessageFilter::Not(inner) => !inner.matches(msg),
        }
    }
}

/// True when `msg` passes every filter. An empty list matches everything.
pub fn matches_all(filters: &[MessageFilter], msg: &Message) -> bool {
    filters.iter().all(|f| f.matches(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentType;
    use canopy_common::SessionId;

    fn msg(id: &str, parent: Option<&str>, t: MessageType, role: Role, tool: &str) -> Message {
        Message {
            id: id.into(),
            parent_id: parent.map(String::from),
            session_id: SessionId::from("s"),
            index: 0,
            time: chrono::Utc::now(),
            role,
            message_type: t,
            tool: tool.into(),
            content_type: ContentType::Text,
            content: String::new(),
        }
    }

    #[test]
    fn parent_none_matches_roots_only() {
        let root = msg("a", None, MessageType::Call, Role::User, "agent");
        let child = msg("b", Some("a"), MessageType::Result, Role::Tool, "agent");
        let filter = MessageFilter::Parent(None);
        assert!(filter.matches(&root));
        assert!(!filter.matches(&child));
        assert!(MessageFilter::parent("a").matches(&child));
        assert!(MessageFilter::Root.matches(&root));
    }

    #[test]
    fn combinators_compose() {
        let call = msg("c", Some("a"), MessageType::Call, Role::Assistant, "list_metrics");
        let first_invocation = MessageFilter::All(vec![
            MessageFilter::Type(MessageType::Call),
            MessageFilter::tool("list_metrics"),
        ]);
        assert!(first_invocation.matches(&call));

        let either = MessageFilter::Any(vec![
            MessageFilter::Role(Role::User),
            MessageFilter::Id("c".into()),
        ]);
        assert!(either.matches(&call));
        assert!(!either.clone().negate().matches(&call));
    }

    #[test]
    fn empty_filter_list_matches_everything() {
        let m = msg("x", None, MessageType::Prompt, Role::User, "");
        assert!(matches_all(&[], &m));
        assert!(!matches_all(&[MessageFilter::Type(MessageType::Call)], &m));
    }
}
