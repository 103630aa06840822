//! Streaming chat session client for the Atlas assistant.

mod accumulator;
pub mod codec;
pub mod connection;
mod endpoint;
mod error;
mod session;
mod store;
mod submit;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use accumulator::{FoldOutcome, StreamAccumulator, ERROR_NOTICE};
pub use connection::{
    ConnectionManager, Connector, LinkEvent, TransportEvent, TransportEvents, WsConnector,
    DEFAULT_RECONNECT_DELAY,
};
pub use endpoint::{endpoint_for_origin, DEFAULT_WS_PATH};
pub use error::AtlasError;
pub use session::{ChatSession, SessionConfig, SessionHandle};
pub use store::{SessionStore, DEFAULT_GREETING};
pub use submit::{FrameSink, SubmissionController, SubmitOutcome};

/// Result type for Atlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;
