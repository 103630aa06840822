//! Transport connection manager.
//!
//! Owns at most one physical connection. Each attempt gets a generation
//! number; transport events from an older attempt are dropped, so a stale
//! close can never knock down a newer connection. After an unplanned
//! disconnect a single reconnect is scheduled after a fixed delay.

use atlas_types::ConnectionState;
use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

/// Default delay between an unplanned disconnect and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long teardown waits for the close handshake before aborting I/O.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle events reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport acknowledged the open.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The peer closed the connection.
    Closed,
    /// Connecting failed or the connection broke.
    Failed(String),
}

/// Transport event tagged with the attempt that produced it.
pub type TaggedEvent = (u64, TransportEvent);

/// Event sender handed to a connector for one connection attempt.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl TransportEvents {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the session has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    pub fn frame(&self, raw: impl Into<String>) -> bool {
        self.emit(TransportEvent::Frame(raw.into()))
    }

    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }

    pub fn failed(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Failed(reason.into()))
    }
}

/// Opens physical connections.
///
/// The returned future drives one connection: it reports lifecycle events
/// through `events`, writes every frame received on `outbound`, and closes
/// the connection once `outbound` is closed. It must report at most one of
/// `Closed`/`Failed`.
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        url: Url,
        events: TransportEvents,
        outbound: mpsc::UnboundedReceiver<String>,
    ) -> BoxFuture<'static, ()>;
}

/// WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(
        &self,
        url: Url,
        events: TransportEvents,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) -> BoxFuture<'static, ()> {
        async move {
            let socket = match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((socket, _response)) => socket,
                Err(e) => {
                    events.failed(e.to_string());
                    return;
                }
            };
            if !events.opened() {
                return;
            }

            let (mut ws_tx, mut ws_rx) = socket.split();
            loop {
                tokio::select! {
                    frame = outbound.recv() => match frame {
                        Some(text) => {
                            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                                events.failed(e.to_string());
                                break;
                            }
                        }
                        None => {
                            // Session teardown.
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    msg = ws_rx.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !events.frame(text.as_str()) {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if !events.frame(String::from_utf8_lossy(&data).into_owned()) {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            events.closed();
                            break;
                        }
                        Some(Ok(_)) => {
                            trace!(target: "atlas::transport", "Ignoring control frame");
                        }
                        Some(Err(e)) => {
                            events.failed(e.to_string());
                            break;
                        }
                    },
                }
            }
        }
        .boxed()
    }
}

/// What a transport event meant for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Frame(String),
    /// Connection lost; a reconnect has been scheduled.
    Disconnected,
    /// Stale or duplicate event.
    Ignored,
}

pub struct ConnectionManager {
    url: Url,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    io_task: Option<JoinHandle<()>>,
    reconnect_at: Option<Instant>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    shut_down: bool,
}

impl ConnectionManager {
    /// Create a manager and the receiver its transports report into.
    pub fn new(
        url: Url,
        connector: Arc<dyn Connector>,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            url,
            connector,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            generation: 0,
            outbound: None,
            io_task: None,
            reconnect_at: None,
            events_tx,
            shut_down: false,
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Generation of the current (or last) connection attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the scheduled reconnect is due, if one is pending.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Start a connection attempt. No-op unless disconnected.
    pub fn open(&mut self) -> bool {
        if self.shut_down || self.state != ConnectionState::Disconnected {
            return false;
        }

        self.reconnect_at = None;
        self.generation += 1;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let events = TransportEvents {
            generation: self.generation,
            tx: self.events_tx.clone(),
        };

        info!(
            target: "atlas::transport",
            "Connecting to {} (attempt {})",
            self.url, self.generation
        );
        let fut = self.connector.connect(self.url.clone(), events, outbound_rx);
        self.io_task = Some(tokio::spawn(fut));
        self.outbound = Some(outbound_tx);
        self.state = ConnectionState::Connecting;
        true
    }

    /// Fire the scheduled reconnect if it is due.
    pub fn reconnect_if_due(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(deadline) if deadline <= now => {
                self.reconnect_at = None;
                self.open()
            }
            _ => false,
        }
    }

    /// Send a frame. Silently dropped unless connected.
    pub fn send(&mut self, frame: String) {
        if self.state != ConnectionState::Connected {
            debug!(target: "atlas::transport", "Dropping frame while {}", self.state);
            return;
        }
        if let Some(tx) = &self.outbound {
            if tx.send(frame).is_err() {
                debug!(target: "atlas::transport", "Transport writer already gone");
            }
        }
    }

    /// Apply one transport event.
    pub fn handle(&mut self, generation: u64, event: TransportEvent) -> LinkEvent {
        if self.shut_down || generation != self.generation {
            trace!(
                target: "atlas::transport",
                "Ignoring event from attempt {} (current {})",
                generation, self.generation
            );
            return LinkEvent::Ignored;
        }

        match event {
            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    return LinkEvent::Ignored;
                }
                self.state = ConnectionState::Connected;
                info!(target: "atlas::transport", "Connected to {}", self.url);
                LinkEvent::Connected
            }
            TransportEvent::Frame(raw) => {
                // Only a live link delivers frames; a closed one stays closed.
                if self.state != ConnectionState::Connected {
                    trace!(target: "atlas::transport", "Dropping frame while {}", self.state);
                    return LinkEvent::Ignored;
                }
                LinkEvent::Frame(raw)
            }
            TransportEvent::Closed => self.lost(None),
            TransportEvent::Failed(reason) => self.lost(Some(reason)),
        }
    }

    fn lost(&mut self, reason: Option<String>) -> LinkEvent {
        if self.state == ConnectionState::Disconnected {
            return LinkEvent::Ignored;
        }

        match reason {
            Some(reason) => warn!(target: "atlas::transport", "Connection error: {}", reason),
            None => info!(target: "atlas::transport", "Connection closed"),
        }
        self.state = ConnectionState::Disconnected;
        self.outbound = None;
        self.io_task = None;
        self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
        debug!(
            target: "atlas::transport",
            "Reconnecting in {} ms",
            self.reconnect_delay.as_millis()
        );
        LinkEvent::Disconnected
    }

    /// Close the live connection and cancel any pending reconnect.
    pub async fn shutdown(&mut self) {
        self.shut_down = true;
        self.reconnect_at = None;
        self.state = ConnectionState::Disconnected;
        // Dropping the writer asks the transport to close.
        self.outbound = None;

        if let Some(mut task) = self.io_task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                debug!(target: "atlas::transport", "Close handshake timed out, aborting");
                task.abort();
            }
        }
        info!(target: "atlas::transport", "Connection manager shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
    }
}

impl crate::FrameSink for ConnectionManager {
    fn send(&mut self, frame: String) {
        ConnectionManager::send(self, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryConnector;

    fn manager(connector: &MemoryConnector) -> (ConnectionManager, mpsc::UnboundedReceiver<TaggedEvent>) {
        ConnectionManager::new(
            Url::parse("ws://localhost:8000/ws/atlas").unwrap(),
            Arc::new(connector.clone()),
            DEFAULT_RECONNECT_DELAY,
        )
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> TaggedEvent {
        rx.recv().await.expect("event channel open")
    }

    #[tokio::test]
    async fn test_open_then_connected() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);

        assert!(mgr.open());
        assert_eq!(mgr.state(), ConnectionState::Connecting);
        assert!(!mgr.open(), "second open while connecting is a no-op");

        tokio::task::yield_now().await;
        assert_eq!(connector.attempts(), 1);
        connector.link(0).open();

        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Connected);
        assert_eq!(mgr.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_send_only_when_connected() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);

        mgr.send("early".to_string());
        mgr.open();
        tokio::task::yield_now().await;
        mgr.send("still connecting".to_string());
        assert!(connector.link(0).sent().is_empty());

        connector.link(0).open();
        let (generation, event) = next(&mut rx).await;
        mgr.handle(generation, event);
        mgr.send("hello".to_string());

        assert_eq!(connector.link(0).sent(), vec!["hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_single_reconnect() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);
        mgr.open();
        tokio::task::yield_now().await;
        let link = connector.link(0);
        link.open();
        let (generation, event) = next(&mut rx).await;
        mgr.handle(generation, event);

        let closed_at = Instant::now();
        link.close();
        link.fail("late error");
        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Disconnected);
        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Ignored);

        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(mgr.reconnect_deadline(), Some(closed_at + DEFAULT_RECONNECT_DELAY));

        assert!(!mgr.reconnect_if_due(Instant::now()));
        tokio::time::advance(DEFAULT_RECONNECT_DELAY).await;
        assert!(mgr.reconnect_if_due(Instant::now()));
        assert_eq!(mgr.state(), ConnectionState::Connecting);
        assert_eq!(mgr.generation(), 2);
        assert_eq!(mgr.reconnect_deadline(), None);
    }

    #[tokio::test]
    async fn test_frames_after_close_ignored() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);
        mgr.open();
        tokio::task::yield_now().await;
        let link = connector.link(0);
        link.open();
        link.push_frame("live");
        link.close();
        link.push_frame("ghost");

        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Connected);
        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Frame("live".to_string()));
        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Disconnected);
        let (generation, event) = next(&mut rx).await;
        assert_eq!(mgr.handle(generation, event), LinkEvent::Ignored);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_connect_schedules_reconnect() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);
        mgr.open();
        tokio::task::yield_now().await;

        connector.link(0).fail("connection refused");
        let (generation, event) = next(&mut rx).await;

        assert_eq!(mgr.handle(generation, event), LinkEvent::Disconnected);
        assert!(mgr.reconnect_deadline().is_some());
    }

    #[tokio::test]
    async fn test_stale_generation_ignored() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);
        mgr.open();
        tokio::task::yield_now().await;
        connector.link(0).fail("refused");
        let (generation, event) = next(&mut rx).await;
        mgr.handle(generation, event);

        mgr.open();
        tokio::task::yield_now().await;
        // The first attempt reports again after the second one started.
        connector.link(0).close();
        let (generation, event) = next(&mut rx).await;

        assert_eq!(generation, 1);
        assert_eq!(mgr.handle(generation, event), LinkEvent::Ignored);
        assert_eq!(mgr.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_reconnect() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);
        mgr.open();
        tokio::task::yield_now().await;
        connector.link(0).fail("refused");
        let (generation, event) = next(&mut rx).await;
        mgr.handle(generation, event);
        assert!(mgr.reconnect_deadline().is_some());

        mgr.shutdown().await;

        assert!(mgr.is_shut_down());
        assert_eq!(mgr.reconnect_deadline(), None);
        assert!(!mgr.open());
        assert!(!mgr.reconnect_if_due(Instant::now() + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_outbound() {
        let connector = MemoryConnector::new();
        let (mut mgr, mut rx) = manager(&connector);
        mgr.open();
        tokio::task::yield_now().await;
        connector.link(0).open();
        let (generation, event) = next(&mut rx).await;
        mgr.handle(generation, event);

        mgr.shutdown().await;

        assert!(connector.link(0).writer_closed());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }
}
