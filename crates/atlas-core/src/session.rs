//! Chat session runtime.
//!
//! A session is an explicit object: `ChatSession::start` spawns one event
//! loop task that owns the store, the accumulator, the submission controller
//! and the connection manager. Commands, transport events and the reconnect
//! timer are multiplexed on that single task, so no two handlers ever run
//! concurrently and the store needs no locking. Observers get immutable
//! snapshots through a `watch` channel.

use crate::connection::{ConnectionManager, Connector, LinkEvent, TaggedEvent, DEFAULT_RECONNECT_DELAY};
use crate::endpoint::{endpoint_for_origin, DEFAULT_WS_PATH};
use crate::store::DEFAULT_GREETING;
use crate::{codec, AtlasError, Result, SessionStore, StreamAccumulator, SubmissionController, SubmitOutcome};
use atlas_types::SessionSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use url::Url;

/// Configuration for one chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Origin of the hosting page, e.g. `https://dash.example.com`
    pub origin: String,
    /// Socket path on that origin
    pub ws_path: String,
    /// Fixed delay before reconnecting after a disconnect
    pub reconnect_delay: Duration,
    /// Assistant greeting seeded into the log
    pub greeting: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn endpoint(&self) -> Result<Url> {
        endpoint_for_origin(&self.origin, &self.ws_path)
    }
}

enum SessionCommand {
    Input(InputCommand),
    Shutdown { done: oneshot::Sender<()> },
}

/// Commands that act on the conversation.
enum InputCommand {
    Submit {
        text: String,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    SetDraft(String),
    SubmitDraft {
        reply: oneshot::Sender<SubmitOutcome>,
    },
}

/// Entry point for starting sessions.
pub struct ChatSession;

impl ChatSession {
    /// Start a session and begin connecting. Must be called inside a tokio runtime.
    pub fn start(config: SessionConfig, connector: Arc<dyn Connector>) -> Result<SessionHandle> {
        let url = config.endpoint()?;
        let (connection, transport_rx) =
            ConnectionManager::new(url, connector, config.reconnect_delay);
        let store = SessionStore::new(&config.greeting);
        let (snapshot_tx, snapshot_rx) = watch::channel(store.snapshot());
        let (command_tx, command_rx) = mpsc::channel(32);

        let event_loop = SessionLoop {
            store,
            accumulator: StreamAccumulator::new(),
            controller: SubmissionController::new(),
            connection,
            snapshot_tx,
        };
        info!(target: "atlas::session", "Starting chat session for {}", event_loop.connection.url());
        let task = tokio::spawn(event_loop.run(command_rx, transport_rx));

        Ok(SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task: Some(task),
        })
    }
}

/// Handle held by the presentation layer.
///
/// Dropping the handle tears the session down as well; `shutdown` does the
/// same but waits for the connection to close.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Current state of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Submit `text` as a user message.
    pub async fn submit(&self, text: impl Into<String>) -> Result<SubmitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(InputCommand::Submit {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| AtlasError::SessionClosed)
    }

    /// Replace the draft input buffer.
    pub async fn set_draft(&self, text: impl Into<String>) -> Result<()> {
        self.send(InputCommand::SetDraft(text.into())).await
    }

    /// Submit whatever is in the draft buffer.
    pub async fn submit_draft(&self) -> Result<SubmitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(InputCommand::SubmitDraft { reply }).await?;
        rx.await.map_err(|_| AtlasError::SessionClosed)
    }

    /// Close the connection, cancel any pending reconnect and stop the loop.
    pub async fn shutdown(mut self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn send(&self, command: InputCommand) -> Result<()> {
        self.commands
            .send(SessionCommand::Input(command))
            .await
            .map_err(|_| AtlasError::SessionClosed)
    }
}

struct SessionLoop {
    store: SessionStore,
    accumulator: StreamAccumulator,
    controller: SubmissionController,
    connection: ConnectionManager,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut transport: mpsc::UnboundedReceiver<TaggedEvent>,
    ) {
        self.connection.open();
        self.sync_connection_state();
        self.publish();

        loop {
            let deadline = self.connection.reconnect_deadline();
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Shutdown { done }) => {
                        self.teardown().await;
                        let _ = done.send(());
                        return;
                    }
                    Some(SessionCommand::Input(cmd)) => self.handle_command(cmd),
                    // Every handle is gone.
                    None => break,
                },
                Some((generation, event)) = transport.recv() => {
                    self.handle_transport(generation, event);
                }
                _ = wait_until(deadline) => {
                    self.connection.reconnect_if_due(Instant::now());
                    self.sync_connection_state();
                }
            }
            self.publish();
        }

        self.teardown().await;
    }

    fn handle_command(&mut self, cmd: InputCommand) {
        match cmd {
            InputCommand::Submit { text, reply } => {
                let outcome = self.controller.submit(
                    &text,
                    &mut self.store,
                    &mut self.accumulator,
                    &mut self.connection,
                );
                self.publish();
                let _ = reply.send(outcome);
            }
            InputCommand::SetDraft(text) => self.controller.set_draft(text),
            InputCommand::SubmitDraft { reply } => {
                let outcome = self.controller.submit_draft(
                    &mut self.store,
                    &mut self.accumulator,
                    &mut self.connection,
                );
                self.publish();
                let _ = reply.send(outcome);
            }
        }
    }

    fn handle_transport(&mut self, generation: u64, event: crate::connection::TransportEvent) {
        match self.connection.handle(generation, event) {
            LinkEvent::Frame(raw) => match codec::decode_frame(&raw) {
                Ok(message) => {
                    let outcome = self.accumulator.apply(&mut self.store, message);
                    trace!(target: "atlas::stream", "Folded frame: {:?}", outcome);
                }
                Err(e) => {
                    warn!(target: "atlas::protocol", "Discarding frame: {}", e);
                }
            },
            LinkEvent::Disconnected => {
                self.accumulator.connection_lost(&mut self.store);
            }
            LinkEvent::Connected | LinkEvent::Ignored => {}
        }
        self.sync_connection_state();
    }

    fn sync_connection_state(&mut self) {
        self.store.set_connection_state(self.connection.state());
    }

    fn publish(&self) {
        let next = self.store.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    async fn teardown(&mut self) {
        debug!(target: "atlas::session", "Tearing down chat session");
        self.connection.shutdown().await;
        self.accumulator.connection_lost(&mut self.store);
        self.sync_connection_state();
        self.publish();
        info!(target: "atlas::session", "Chat session closed");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_endpoint() {
        let config = SessionConfig::default();
        assert_eq!(config.endpoint().unwrap().as_str(), "ws://localhost:8000/ws/atlas");
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let config = SessionConfig {
            origin: "mailto:someone@example.com".to_string(),
            ..SessionConfig::default()
        };
        assert!(matches!(config.endpoint(), Err(AtlasError::InvalidOrigin { .. })));
    }
}
