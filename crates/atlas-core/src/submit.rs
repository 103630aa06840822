//! Submission controller: gates user input before it reaches the wire.

use crate::{codec, SessionStore, StreamAccumulator};
use atlas_types::ConversationEntry;
use tracing::{debug, warn};

/// Destination for encoded outbound frames.
pub trait FrameSink {
    /// Send one frame. A sink that is not connected drops it silently.
    fn send(&mut self, frame: String);
}

impl FrameSink for Vec<String> {
    fn send(&mut self, frame: String) {
        self.push(frame);
    }
}

/// Result of a submission attempt. Rejections have no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent,
    RejectedEmpty,
    RejectedDisconnected,
    /// A reply is still being composed for the previous submission.
    RejectedAwaitingReply,
}

impl SubmitOutcome {
    pub fn is_sent(self) -> bool {
        self == SubmitOutcome::Sent
    }
}

/// Owns the draft input buffer and the submit rule.
#[derive(Debug, Default)]
pub struct SubmissionController {
    draft: String,
}

impl SubmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft with what the user has typed so far.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.draft.push_str(text);
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    /// Submit the current draft.
    pub fn submit_draft(
        &mut self,
        store: &mut SessionStore,
        accumulator: &mut StreamAccumulator,
        sink: &mut dyn FrameSink,
    ) -> SubmitOutcome {
        let raw = std::mem::take(&mut self.draft);
        let outcome = self.submit(&raw, store, accumulator, sink);
        if !outcome.is_sent() {
            self.draft = raw;
        }
        outcome
    }

    /// Validate `raw`, record it as a user entry and send it.
    pub fn submit(
        &mut self,
        raw: &str,
        store: &mut SessionStore,
        accumulator: &mut StreamAccumulator,
        sink: &mut dyn FrameSink,
    ) -> SubmitOutcome {
        let content = raw.trim();
        if content.is_empty() {
            return SubmitOutcome::RejectedEmpty;
        }
        if !store.connection().is_connected() {
            debug!(target: "atlas::submit", "Not connected, dropping submission");
            return SubmitOutcome::RejectedDisconnected;
        }
        if store.awaiting_reply() {
            debug!(target: "atlas::submit", "Reply pending, dropping submission");
            return SubmitOutcome::RejectedAwaitingReply;
        }

        let frame = match codec::encode_user_message(content) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "atlas::submit", "Failed to encode message: {}", e);
                return SubmitOutcome::RejectedEmpty;
            }
        };

        // An unsolicited reply may still be open; the user entry ends it.
        accumulator.seal_open(store);
        store.append(ConversationEntry::user(content));
        store.set_awaiting_reply(true);
        self.draft.clear();
        sink.send(frame);
        debug!(target: "atlas::submit", "Sent message ({} chars)", content.len());
        SubmitOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::{ChatRole, ConnectionState, WsServerMessage};

    fn connected_store() -> SessionStore {
        let mut store = SessionStore::default();
        store.set_connection_state(ConnectionState::Connected);
        store
    }

    #[test]
    fn test_blank_submissions_have_no_effect() {
        let mut store = connected_store();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();

        assert_eq!(controller.submit("", &mut store, &mut acc, &mut sent), SubmitOutcome::RejectedEmpty);
        assert_eq!(controller.submit("   ", &mut store, &mut acc, &mut sent), SubmitOutcome::RejectedEmpty);

        assert_eq!(store.len(), 1);
        assert!(sent.is_empty());
        assert!(!store.awaiting_reply());
    }

    #[test]
    fn test_disconnected_submission_has_no_effect() {
        let mut store = SessionStore::default();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();

        let outcome = controller.submit("hello", &mut store, &mut acc, &mut sent);

        assert_eq!(outcome, SubmitOutcome::RejectedDisconnected);
        assert_eq!(store.len(), 1);
        assert!(sent.is_empty());

        store.set_connection_state(ConnectionState::Connecting);
        let outcome = controller.submit("hello", &mut store, &mut acc, &mut sent);
        assert_eq!(outcome, SubmitOutcome::RejectedDisconnected);
        assert!(sent.is_empty());
    }

    #[test]
    fn test_connected_submission_sends_one_frame() {
        let mut store = connected_store();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();
        controller.set_draft("hello");

        let outcome = controller.submit("hello", &mut store, &mut acc, &mut sent);

        assert_eq!(outcome, SubmitOutcome::Sent);
        assert_eq!(store.len(), 2);
        let entry = store.last().unwrap();
        assert_eq!(entry.role, ChatRole::User);
        assert_eq!(entry.content, "hello");
        assert!(entry.sealed);
        assert!(store.awaiting_reply());
        assert_eq!(sent, vec![r#"{"type":"message","content":"hello"}"#.to_string()]);
        assert_eq!(controller.draft(), "");
    }

    #[test]
    fn test_submission_is_trimmed() {
        let mut store = connected_store();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();

        controller.submit("  Hi there \n", &mut store, &mut acc, &mut sent);

        assert_eq!(store.last().unwrap().content, "Hi there");
        assert_eq!(sent[0], r#"{"type":"message","content":"Hi there"}"#);
    }

    #[test]
    fn test_second_submission_rejected_while_awaiting_reply() {
        let mut store = connected_store();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();

        controller.submit("one", &mut store, &mut acc, &mut sent);
        let outcome = controller.submit("two", &mut store, &mut acc, &mut sent);

        assert_eq!(outcome, SubmitOutcome::RejectedAwaitingReply);
        assert_eq!(store.len(), 2);
        assert_eq!(sent.len(), 1);

        acc.apply(&mut store, WsServerMessage::Complete);
        assert!(controller.submit("two", &mut store, &mut acc, &mut sent).is_sent());
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn test_submission_seals_unsolicited_open_reply() {
        let mut store = connected_store();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();
        acc.apply(
            &mut store,
            WsServerMessage::Chunk {
                content: "unprompted".to_string(),
            },
        );

        controller.submit("hi", &mut store, &mut acc, &mut sent);

        assert!(store.entries()[1].sealed);
        assert_eq!(store.entries()[2].role, ChatRole::User);
        assert_eq!(store.open_reply_index(), None);
    }

    #[test]
    fn test_submit_draft_keeps_draft_on_rejection() {
        let mut store = SessionStore::default();
        let mut acc = StreamAccumulator::new();
        let mut controller = SubmissionController::new();
        let mut sent: Vec<String> = Vec::new();
        controller.set_draft("Hel");
        controller.push_str("lo");

        assert_eq!(
            controller.submit_draft(&mut store, &mut acc, &mut sent),
            SubmitOutcome::RejectedDisconnected
        );
        assert_eq!(controller.draft(), "Hello");

        store.set_connection_state(ConnectionState::Connected);
        assert!(controller.submit_draft(&mut store, &mut acc, &mut sent).is_sent());
        assert_eq!(controller.draft(), "");
        assert_eq!(store.last().unwrap().content, "Hello");
    }
}
