//! One duplex link to one remote peer.
//!
//! An open link owns two tasks:
//!
//! - a **reader** that decodes every inbound frame and pushes it onto the
//!   mesh's shared event queue;
//! - a **writer** fed by an unbounded channel, so queuing a message never
//!   waits on the network and a slow peer cannot stall the others.
//!
//! Whichever task sees the link break first moves it to
//! [`LinkState::Closed`] and reports [`MeshEvent::PeerLost`]. The swap to
//! `Closed` is atomic, so the report happens exactly once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use meshtris_protocol::{Codec, JsonCodec, PeerAddress, TetrisMessage};
use meshtris_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{MeshError, MeshEvent};

/// Lifecycle of a link. `Closed` is terminal: links are never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Dial or handshake in progress.
    Connecting,
    Open,
    Closed,
}

impl LinkState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closed => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Link state shared between the link handle and its tasks.
#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: LinkState) -> Self {
        Self(Arc::new(AtomicU8::new(state.as_u8())))
    }

    fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `Closed`. Returns `true` only for the caller that made
    /// the transition.
    fn close(&self) -> bool {
        self.0.swap(LinkState::Closed.as_u8(), Ordering::AcqRel) != LinkState::Closed.as_u8()
    }
}

struct LinkIo {
    conn: Arc<WebSocketConnection>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// A link to one remote peer.
pub struct PeerLink {
    peer: PeerAddress,
    state: SharedState,
    io: Option<LinkIo>,
}

impl PeerLink {
    /// Starts the reader and writer tasks on an established connection.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn open(
        peer: PeerAddress,
        conn: WebSocketConnection,
        events: mpsc::UnboundedSender<MeshEvent>,
    ) -> Self {
        let state = SharedState::new(LinkState::Open);
        let conn = Arc::new(conn);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            peer.clone(),
            Arc::clone(&conn),
            state.clone(),
            events.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            peer.clone(),
            Arc::clone(&conn),
            state.clone(),
            outbound_rx,
            events,
        ));

        tracing::debug!(%peer, conn_id = %conn.id(), "link open");
        Self {
            peer,
            state,
            io: Some(LinkIo {
                conn,
                outbound,
                reader,
                writer,
            }),
        }
    }

    /// A placeholder for a configured peer that never joined.
    pub(crate) fn never_joined(peer: PeerAddress) -> Self {
        Self {
            peer,
            state: SharedState::new(LinkState::Closed),
            io: None,
        }
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    pub fn state(&self) -> LinkState {
        self.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }

    /// Queues an encoded frame for the writer task.
    ///
    /// Returns `false` if the link is not open.
    pub(crate) fn enqueue(&self, frame: Vec<u8>) -> bool {
        match &self.io {
            Some(io) if self.is_open() => io.outbound.send(frame).is_ok(),
            _ => false,
        }
    }

    /// Closes the link without reporting it as lost. Idempotent.
    pub(crate) async fn close(&mut self) {
        self.state.close();
        if let Some(io) = self.io.take() {
            io.reader.abort();
            // Dropping the sender lets the writer flush what is already
            // queued before it exits.
            drop(io.outbound);
            let _ = io.writer.await;
            if let Err(e) = io.conn.close().await {
                tracing::debug!(peer = %self.peer, error = %e, "close failed");
            }
            tracing::debug!(peer = %self.peer, "link closed locally");
        }
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        if let Some(io) = &self.io {
            io.reader.abort();
            io.writer.abort();
        }
    }
}

impl fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerLink")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}

fn report_lost(
    peer: &PeerAddress,
    state: &SharedState,
    events: &mpsc::UnboundedSender<MeshEvent>,
    cause: MeshError,
) {
    if state.close() {
        tracing::info!(%peer, error = %cause, "peer lost");
        let _ = events.send(MeshEvent::PeerLost(peer.clone()));
    }
}

async fn read_loop(
    peer: PeerAddress,
    conn: Arc<WebSocketConnection>,
    state: SharedState,
    events: mpsc::UnboundedSender<MeshEvent>,
) {
    let codec = JsonCodec;
    let reason = loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => break "closed by peer".to_string(),
            Err(e) => break e.to_string(),
        };

        let msg = match codec.decode_message(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        if matches!(msg, TetrisMessage::GameState { .. }) {
            tracing::trace!(%peer, kind = %msg.kind(), "received");
        } else {
            tracing::debug!(%peer, kind = %msg.kind(), "received");
        }

        let event = MeshEvent::Message {
            from: peer.clone(),
            msg,
        };
        if events.send(event).is_err() {
            // The mesh is gone; nobody is listening.
            return;
        }
    };

    report_lost(&peer, &state, &events, MeshError::Stream { peer: peer.clone(), reason });
}

async fn write_loop(
    peer: PeerAddress,
    conn: Arc<WebSocketConnection>,
    state: SharedState,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<MeshEvent>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = conn.send(&frame).await {
            report_lost(
                &peer,
                &state,
                &events,
                MeshError::Stream {
                    peer: peer.clone(),
                    reason: e.to_string(),
                },
            );
            let _ = conn.close().await;
            return;
        }
    }
}
