//! Conversation timeline: the ordered list of entries the widget renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who an entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

/// A single timeline entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }
}

/// Append-only log of entries, except for `seed`, which resets it to a single welcome entry.
#[derive(Debug, Clone, Default)]
pub struct MessageTimeline {
    entries: Vec<Message>,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeline holding only the welcome entry.
    pub fn seeded(welcome_text: impl Into<String>) -> Self {
        let mut t = Self::new();
        t.seed(welcome_text);
        t
    }

    /// Replace all entries with one assistant message.
    pub fn seed(&mut self, welcome_text: impl Into<String>) {
        self.entries.clear();
        self.entries.push(Message::assistant(welcome_text));
    }

    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// Most recent entry with role `user`.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.entries.iter().rev().find(|m| m.role == Role::User)
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_replaces_everything() {
        let mut t = MessageTimeline::seeded("hello");
        t.append(Message::user("a"));
        t.append(Message::assistant("b"));
        t.seed("cleared");
        assert_eq!(t.len(), 1);
        let only = t.last().unwrap();
        assert_eq!(only.role, Role::Assistant);
        assert_eq!(only.content, "cleared");
    }

    #[test]
    fn append_keeps_order() {
        let mut t = MessageTimeline::seeded("hello");
        t.append(Message::user("one"));
        t.append(Message::error("boom"));
        t.append(Message::user("two"));
        let contents: Vec<_> = t.entries().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["hello", "one", "boom", "two"]);
    }

    #[test]
    fn last_user_message_scans_from_end() {
        let mut t = MessageTimeline::seeded("hello");
        assert!(t.last_user_message().is_none());
        t.append(Message::user("first"));
        t.append(Message::user("second"));
        t.append(Message::error("failed"));
        assert_eq!(t.last_user_message().unwrap().content, "second");
    }

    #[test]
    fn ids_are_unique() {
        let a = Message::user("same");
        let b = Message::user("same");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(Message::error("x")).unwrap();
        assert_eq!(json["role"], "error");
    }
}
