//! Error types for the Atlas chat client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("Invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AtlasError {
    /// Whether this error is a protocol violation that the session discards.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            AtlasError::MalformedFrame(_) | AtlasError::UnknownEventKind(_)
        )
    }
}
