//! In-memory transport for tests.
//!
//! `MemoryConnector` records every connection attempt as a [`MemoryLink`]
//! that a test can drive by hand: acknowledge the open, push inbound frames,
//! close or fail the link, and read what the client sent.

use crate::connection::{Connector, TransportEvent, TransportEvents};
use futures::future::{BoxFuture, FutureExt};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use url::Url;

/// Connector that never touches the network.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    links: Arc<Mutex<Vec<MemoryLink>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// The link created by attempt `index` (0-based).
    pub fn link(&self, index: usize) -> MemoryLink {
        self.links
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no connection attempt #{}", index))
    }

    /// The most recent link.
    pub fn last_link(&self) -> MemoryLink {
        let links = self.links.lock().unwrap();
        links.last().cloned().expect("no connection attempts")
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        url: Url,
        events: TransportEvents,
        outbound: mpsc::UnboundedReceiver<String>,
    ) -> BoxFuture<'static, ()> {
        self.links.lock().unwrap().push(MemoryLink {
            url,
            events,
            outbound: Arc::new(Mutex::new(outbound)),
        });
        futures::future::ready(()).boxed()
    }
}

/// One recorded connection attempt.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    pub url: Url,
    events: TransportEvents,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl MemoryLink {
    pub fn open(&self) {
        self.events.emit(TransportEvent::Opened);
    }

    pub fn push_frame(&self, raw: &str) {
        self.events.emit(TransportEvent::Frame(raw.to_string()));
    }

    pub fn close(&self) {
        self.events.emit(TransportEvent::Closed);
    }

    pub fn fail(&self, reason: &str) {
        self.events.emit(TransportEvent::Failed(reason.to_string()));
    }

    /// Drain the frames the client has written so far.
    pub fn sent(&self) -> Vec<String> {
        let mut rx = self.outbound.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Whether the client dropped its writer (teardown or disconnect).
    pub fn writer_closed(&self) -> bool {
        matches!(
            self.outbound.lock().unwrap().try_recv(),
            Err(TryRecvError::Disconnected)
        )
    }
}
