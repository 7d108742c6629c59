//! Conversation session, message, and stream event types for Agentry.
//!
//! A [`ConversationSession`] carries two parallel records of the exchange:
//! `messages` is the structured context replayed to the engine on every turn,
//! `history` is a flat role/content/timestamp log kept for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::Human => write!(f, "human"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "user" => Ok(MessageRole::Human),
            "assistant" | "ai" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// One structured message in the engine context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    /// Free-form per-message metadata (engine-specific extras).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// Display-oriented record of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One ongoing exchange of turns against a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub config_id: String,
    pub messages: Vec<ConversationMessage>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl ConversationSession {
    /// Empty, active session. A UUID v7 id is generated when none is given.
    pub fn new(config_id: impl Into<String>, session_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            config_id: config_id.into(),
            messages: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            active: true,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Answer of a non-streaming execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub session_id: String,
    pub response: String,
    /// Number of structured messages in the session after the turn.
    pub message_count: usize,
}

/// Events yielded by a streaming execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationStreamEvent {
    /// A fragment of the assistant response.
    Content { text: String },
    /// The assistant turn was persisted. `message_count` is the session size afterwards.
    Done { message_count: usize },
    /// Persisting the assistant turn failed.
    Error { message: String },
}
