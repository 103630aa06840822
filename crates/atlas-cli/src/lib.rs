//! Atlas terminal client.
//!
//! Configuration, logging setup and the stdin/stdout front end for a chat
//! session. Kept separate from main.rs so the pieces can be tested.

pub mod config;
pub mod logging;
pub mod repl;
