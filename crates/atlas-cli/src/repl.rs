//! Terminal front end for a chat session.
//!
//! Lines typed on stdin become submissions; session snapshots are rendered
//! to stdout incrementally so streamed replies appear as they arrive.

use anyhow::Result;
use atlas_core::{SessionHandle, SubmitOutcome};
use atlas_types::{ChatRole, ConnectionState, SessionSnapshot};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::debug;

const QUIT_COMMAND: &str = "/quit";
const ASSISTANT_PROMPT: &str = "atlas> ";

/// Joins continuation lines: a line ending in `\` continues on the next one.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<String>,
}

impl LineAssembler {
    /// Feed one input line. Returns the full message once it is terminated.
    pub fn push(&mut self, line: &str) -> Option<String> {
        match line.strip_suffix('\\') {
            Some(head) => {
                self.pending.push(head.to_string());
                None
            }
            None => {
                self.pending.push(line.to_string());
                Some(std::mem::take(&mut self.pending).join("\n"))
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Renders snapshots as an append-only transcript.
///
/// User entries are not echoed since the user just typed them. Assistant
/// entries are printed as they grow and terminated with a newline once sealed.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    /// Index of the first entry not yet fully printed
    cursor: usize,
    /// Bytes of `entries[cursor]` already printed
    printed: usize,
    header_printed: bool,
    connection: Option<ConnectionState>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot, out: &mut impl Write) -> std::io::Result<()> {
        while let Some(entry) = snapshot.entries.get(self.cursor) {
            if entry.role == ChatRole::User {
                self.advance();
                continue;
            }

            if !self.header_printed {
                write!(out, "{}", ASSISTANT_PROMPT)?;
                self.header_printed = true;
            }
            // Content only grows while open, so `printed` is a char boundary.
            if let Some(delta) = entry.content.get(self.printed..) {
                write!(out, "{}", delta)?;
                self.printed = entry.content.len();
            }

            if !entry.sealed {
                break;
            }
            writeln!(out)?;
            self.advance();
        }

        self.render_connection(snapshot.connection, out)?;
        out.flush()
    }

    fn render_connection(&mut self, state: ConnectionState, out: &mut impl Write) -> std::io::Result<()> {
        let previous = self.connection.replace(state);
        if previous == Some(state) {
            return Ok(());
        }
        let status = match (previous, state) {
            (_, ConnectionState::Connected) => "[connected]",
            (Some(ConnectionState::Connected), ConnectionState::Disconnected) => {
                "[connection lost, retrying]"
            }
            _ => return Ok(()),
        };
        // A status line in the middle of a streamed reply would split it.
        if self.header_printed {
            writeln!(out)?;
        }
        writeln!(out, "{}", status)?;
        if self.header_printed {
            write!(out, "{}", ASSISTANT_PROMPT)?;
        }
        Ok(())
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.printed = 0;
        self.header_printed = false;
    }
}

/// Human-readable note for a rejected submission.
pub fn rejection_notice(outcome: SubmitOutcome) -> Option<&'static str> {
    match outcome {
        SubmitOutcome::Sent | SubmitOutcome::RejectedEmpty => None,
        SubmitOutcome::RejectedDisconnected => Some("[not connected, message not sent]"),
        SubmitOutcome::RejectedAwaitingReply => Some("[still replying, message not sent]"),
    }
}

/// Drive the session from stdin until EOF, `/quit` or ctrl-c.
pub async fn run(handle: SessionHandle) -> Result<()> {
    let mut snapshots = WatchStream::new(handle.subscribe());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut assembler = LineAssembler::default();
    let mut printer = TranscriptPrinter::new();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.next() => {
                printer.render(&snapshot, &mut stdout)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(target: "atlas::session", "stdin closed");
                    break;
                };
                if !assembler.is_pending() && line.trim() == QUIT_COMMAND {
                    break;
                }
                let Some(message) = assembler.push(&line) else {
                    continue;
                };
                let outcome = handle.submit(message).await?;
                if let Some(notice) = rejection_notice(outcome) {
                    eprintln!("{}", notice);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}
