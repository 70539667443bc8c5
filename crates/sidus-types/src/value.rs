//! Standard value objects exchanged between task phases and skills.
//!
//! The core never interprets values; these are the shapes most skills and
//! connectors agree on. Applications are free to define their own.

use serde::{Deserialize, Serialize};

/// A string transformed by a chain of skills.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringValue {
    pub value: String,
}

impl StringValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A conversation that skills extend, usually by appending one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatValue {
    pub messages: Vec<ChatMessage>,
}

impl ChatValue {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Content of the most recent message, if any.
    pub fn last_content(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.append(Role::User, content);
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.append(Role::Assistant, content);
    }

    pub fn append_system(&mut self, content: impl Into<String>) {
        self.append(Role::System, content);
    }

    fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_content_empty_chat() {
        assert_eq!(ChatValue::default().last_content(), None);
    }

    #[test]
    fn test_append_keeps_order_and_roles() {
        let mut chat = ChatValue::default();
        chat.append_system("be brief");
        chat.append_user("hi");
        chat.append_assistant("hello");

        let roles: Vec<Role> = chat.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(chat.last_content(), Some("hello"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: "ok".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
