//! WebSocket message protocol between the chat client and the assistant server.

use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// A user prompt (trimmed, never empty).
    Message { content: String },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// Partial text of the reply being streamed.
    Chunk { content: String },
    /// The reply being streamed is finished.
    Complete,
    /// The server failed to produce a reply.
    Error {
        /// Diagnostic detail, logged but never shown to the user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl WsServerMessage {
    /// Every `type` tag the client understands.
    pub const KINDS: [&'static str; 3] = ["chunk", "complete", "error"];

    /// Wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            WsServerMessage::Chunk { .. } => "chunk",
            WsServerMessage::Complete => "complete",
            WsServerMessage::Error { .. } => "error",
        }
    }

    pub fn is_known_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }
}
