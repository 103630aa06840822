//! Session state store: the conversation log plus connection and composing
//! indicators. Every mutator is idempotent under duplicate calls.

use atlas_types::{ConnectionState, ConversationEntry, SessionSnapshot};

/// Greeting seeded into every new session.
pub const DEFAULT_GREETING: &str =
    "Hello! I'm ATLAS, your personal AI companion. How can I help you today?";

#[derive(Debug, Clone)]
pub struct SessionStore {
    entries: Vec<ConversationEntry>,
    connection: ConnectionState,
    awaiting_reply: bool,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

impl SessionStore {
    /// Create a store seeded with one sealed assistant greeting.
    pub fn new(greeting: &str) -> Self {
        Self {
            entries: vec![ConversationEntry::assistant(greeting)],
            connection: ConnectionState::Disconnected,
            awaiting_reply: false,
        }
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.last()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Index of the tail entry if it is an open assistant reply.
    pub fn open_reply_index(&self) -> Option<usize> {
        self.entries
            .last()
            .filter(|entry| entry.is_open_reply())
            .map(|_| self.entries.len() - 1)
    }

    /// Append an entry and return its index.
    pub fn append(&mut self, entry: ConversationEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Append streamed text to the entry at `index`.
    ///
    /// Returns false if the entry does not exist or is sealed.
    pub fn extend_entry(&mut self, index: usize, delta: &str) -> bool {
        self.entries
            .get_mut(index)
            .is_some_and(|entry| entry.append(delta))
    }

    /// Seal the last entry. Returns false if there was nothing to seal.
    pub fn seal_last(&mut self) -> bool {
        self.entries.last_mut().is_some_and(ConversationEntry::seal)
    }

    /// Returns false if the state was already current.
    pub fn set_connection_state(&mut self, state: ConnectionState) -> bool {
        if self.connection == state {
            return false;
        }
        self.connection = state;
        true
    }

    /// Returns false if the flag was already current.
    pub fn set_awaiting_reply(&mut self, awaiting: bool) -> bool {
        if self.awaiting_reply == awaiting {
            return false;
        }
        self.awaiting_reply = awaiting;
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            entries: self.entries.clone(),
            connection: self.connection,
            awaiting_reply: self.awaiting_reply,
        }
    }
}
