//! Streaming accumulator.
//!
//! Folds decoded server events into the session store. Replies arrive as a
//! sequence of `chunk` events closed by `complete`; the only multiplexing
//! rule is "append to the open reply at the tail of the log", so events must
//! be folded strictly in arrival order.

use crate::SessionStore;
use atlas_types::{ConversationEntry, WsServerMessage};
use tracing::{debug, warn};

/// Notice shown to the user when the server reports an error.
pub const ERROR_NOTICE: &str = "Sorry, I encountered an error. Please try again.";

/// What a fold did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// A new open reply was created at `index`.
    Started { index: usize },
    /// Text was appended to the open reply at `index`.
    Appended { index: usize },
    /// The reply at `index` was sealed.
    Sealed { index: usize },
    /// An error notice was appended at `index`.
    ErrorReported { index: usize },
    /// Nothing was open; the store is unchanged apart from `awaiting_reply`.
    Ignored,
}

/// Tracks the reply currently being streamed.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Index of the open reply in the store. Never a copy of the entry.
    open_entry: Option<usize>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_entry(&self) -> Option<usize> {
        self.open_entry
    }

    /// Fold one server event into the store.
    pub fn apply(&mut self, store: &mut SessionStore, event: WsServerMessage) -> FoldOutcome {
        match event {
            WsServerMessage::Chunk { content } => self.on_chunk(store, &content),
            WsServerMessage::Complete => self.on_complete(store),
            WsServerMessage::Error { detail } => self.on_error(store, detail.as_deref()),
        }
    }

    fn on_chunk(&mut self, store: &mut SessionStore, text: &str) -> FoldOutcome {
        self.sync(store);
        if let Some(index) = self.open_entry {
            if store.extend_entry(index, text) {
                return FoldOutcome::Appended { index };
            }
        }

        let index = store.append(ConversationEntry::streaming(text));
        self.open_entry = Some(index);
        debug!(target: "atlas::stream", "Started reply at entry {}", index);
        FoldOutcome::Started { index }
    }

    fn on_complete(&mut self, store: &mut SessionStore) -> FoldOutcome {
        store.set_awaiting_reply(false);
        match self.seal_open(store) {
            Some(index) => FoldOutcome::Sealed { index },
            None => {
                debug!(target: "atlas::stream", "Completion with no open reply, ignoring");
                FoldOutcome::Ignored
            }
        }
    }

    fn on_error(&mut self, store: &mut SessionStore, detail: Option<&str>) -> FoldOutcome {
        warn!(
            target: "atlas::stream",
            "Server reported an error: {}",
            detail.unwrap_or("(no detail)")
        );
        // Keep the single-open-reply invariant: whatever was streaming is done.
        self.seal_open(store);
        store.set_awaiting_reply(false);
        let index = store.append(ConversationEntry::assistant(ERROR_NOTICE));
        FoldOutcome::ErrorReported { index }
    }

    /// Force-seal the open reply after the transport went away.
    pub fn connection_lost(&mut self, store: &mut SessionStore) -> FoldOutcome {
        store.set_awaiting_reply(false);
        match self.seal_open(store) {
            Some(index) => {
                debug!(target: "atlas::stream", "Force-sealed reply at entry {} after disconnect", index);
                FoldOutcome::Sealed { index }
            }
            None => FoldOutcome::Ignored,
        }
    }

    /// Seal whatever reply is open, returning its index.
    pub fn seal_open(&mut self, store: &mut SessionStore) -> Option<usize> {
        self.sync(store);
        let index = self.open_entry.take()?;
        store.seal_last();
        Some(index)
    }

    /// Re-derive the open index from the store tail.
    fn sync(&mut self, store: &SessionStore) {
        self.open_entry = store.open_reply_index();
    }
}
