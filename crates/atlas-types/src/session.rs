//! Connection state and the observable session snapshot.

use serde::{Deserialize, Serialize};

use crate::ConversationEntry;

/// Lifecycle of the streaming connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No live connection (initial state, or after close/error).
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Transport acknowledged the open; frames can be sent.
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Read-only view of the session handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Conversation log in arrival order
    pub entries: Vec<ConversationEntry>,
    /// Current connection state
    pub connection: ConnectionState,
    /// Whether the assistant is composing a reply
    pub awaiting_reply: bool,
}

impl SessionSnapshot {
    /// Whether the send affordance should be enabled for `draft`.
    pub fn can_submit(&self, draft: &str) -> bool {
        !draft.trim().is_empty() && self.connection.is_connected() && !self.awaiting_reply
    }

    pub fn last_entry(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_serialization() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, r#""connecting""#);
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn test_can_submit_requires_text_connection_and_idle() {
        let mut snapshot = SessionSnapshot {
            entries: vec![],
            connection: ConnectionState::Connected,
            awaiting_reply: false,
        };
        assert!(snapshot.can_submit("hi"));
        assert!(!snapshot.can_submit("   "));

        snapshot.awaiting_reply = true;
        assert!(!snapshot.can_submit("hi"));

        snapshot.awaiting_reply = false;
        snapshot.connection = ConnectionState::Connecting;
        assert!(!snapshot.can_submit("hi"));
    }
}
