//! Shared types for the Atlas assistant chat client.

mod chat;
mod session;
mod ws;

pub use chat::*;
pub use session::*;
pub use ws::*;
