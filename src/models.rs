//! Core data models for the coach chat backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//
// ================= Roles & Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the sequence sent to the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

//
// ================= Conversation History =================
//

/// One caller-supplied history pair. Either side may be missing when the
/// client sends a malformed entry; such pairs are skipped during prompt
/// assembly, never fabricated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Exchange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
}

impl Exchange {
    pub fn new(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            bot: Some(bot.into()),
        }
    }

    /// Both sides present
    pub fn is_complete(&self) -> bool {
        self.user.is_some() && self.bot.is_some()
    }
}

//
// ================= User Profile =================
//

/// Profile fields used only to bias prompt phrasing. Never consulted by
/// guardrail decisions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub region: Option<String>,
    pub language: Option<String>,
    pub persona: Option<String>,
    pub accessibility: Option<String>,
}

//
// ================= Persistence Records =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// A persisted transcript message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub author: Author,
    pub content: String,
    pub ts: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(author: Author, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            content: content.into(),
            ts: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(rename = "convoId")]
    pub convo_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_completeness() {
        assert!(Exchange::new("hi", "hello").is_complete());

        let missing_bot = Exchange {
            user: Some("hi".into()),
            bot: None,
        };
        assert!(!missing_bot.is_complete());
        assert!(!Exchange::default().is_complete());
    }

    #[test]
    fn test_exchange_deserializes_with_missing_fields() {
        let partial: Exchange = serde_json::from_str(r#"{"user": "hi"}"#).unwrap();
        assert_eq!(partial.user.as_deref(), Some("hi"));
        assert!(partial.bot.is_none());
    }

    #[test]
    fn test_message_role_serialization() {
        let msg = ChatMessage::assistant("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }
}
