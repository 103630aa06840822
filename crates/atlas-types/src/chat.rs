//! Conversation entry types.
//!
//! An entry is either a user prompt or an assistant reply. Assistant replies
//! arrive as a stream of chunks, so an entry stays open (unsealed) until the
//! server signals completion or the connection drops.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the entry author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Typed by the user
    User,
    /// Produced by the assistant
    Assistant,
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Unique entry identifier
    pub id: String,
    /// Who wrote this entry
    pub role: ChatRole,
    /// Text content (may be partial while unsealed)
    pub content: String,
    /// Whether no further chunks will be appended
    #[serde(default)]
    pub sealed: bool,
    /// Creation timestamp (ms since Unix epoch)
    pub timestamp: i64,
}

impl ConversationEntry {
    /// Create a sealed user entry.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content.into(), true)
    }

    /// Create a sealed assistant entry (greeting, error notice).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content.into(), true)
    }

    /// Create an open assistant entry seeded with the first streamed chunk.
    pub fn streaming(first_chunk: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, first_chunk.into(), false)
    }

    fn new(role: ChatRole, content: String, sealed: bool) -> Self {
        let prefix = match role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        Self {
            id: format!("{}-{}", prefix, Uuid::new_v4()),
            role,
            content,
            sealed,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// True for an assistant entry that can still receive chunks.
    pub fn is_open_reply(&self) -> bool {
        self.role == ChatRole::Assistant && !self.sealed
    }

    /// Append streamed text. Sealed entries are left untouched.
    ///
    /// Returns whether the text was appended.
    pub fn append(&mut self, delta: &str) -> bool {
        if self.sealed {
            return false;
        }
        self.content.push_str(delta);
        true
    }

    /// Seal the entry. Returns false if it was already sealed.
    pub fn seal(&mut self) -> bool {
        !std::mem::replace(&mut self.sealed, true)
    }
}
