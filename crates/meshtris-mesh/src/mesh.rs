//! The full mesh: one link per configured remote peer.

use std::collections::{BTreeMap, BTreeSet};

use meshtris_protocol::{Codec, Hello, JsonCodec, PROTOCOL_VERSION, PeerAddress, TetrisMessage};
use meshtris_transport::{Connection, Listener, WebSocketConnection, WebSocketListener};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::{LinkState, MeshConfig, MeshError, PeerLink};

/// Something that happened on one of the links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A decoded message, tagged with the link it arrived on.
    Message { from: PeerAddress, msg: TetrisMessage },

    /// The link to this peer closed, or the peer never joined. Reported
    /// once per peer.
    PeerLost(PeerAddress),
}

/// Direct links to every other participant of a match.
///
/// Built once by [`Mesh::establish`]. Links that break afterwards stay
/// broken; each break surfaces once as [`MeshEvent::PeerLost`].
///
/// Inbound traffic from all links is merged into a single FIFO queue.
/// Order is preserved per peer, not across peers.
#[derive(Debug)]
pub struct Mesh {
    local: PeerAddress,
    links: BTreeMap<PeerAddress, PeerLink>,
    events: mpsc::UnboundedReceiver<MeshEvent>,
    codec: JsonCodec,
}

impl Mesh {
    /// Binds the local listener and connects to every peer in `peers`.
    ///
    /// `peers` may include `local`; it is recognized by address and
    /// skipped. Duplicates are ignored.
    ///
    /// # Errors
    /// Only a failure to bind the listener is an error. Peers that cannot
    /// be reached are reported as [`MeshEvent::PeerLost`] instead.
    pub async fn establish(
        config: MeshConfig,
        local: PeerAddress,
        peers: &[PeerAddress],
    ) -> Result<Self, MeshError> {
        let bind_addr = config
            .bind_addr
            .clone()
            .unwrap_or_else(|| local.to_string());
        let listener = WebSocketListener::bind(&bind_addr)
            .await
            .map_err(|source| MeshError::Bind {
                addr: bind_addr,
                source,
            })?;
        Ok(Self::establish_on(listener, config, local, peers).await)
    }

    /// Like [`Mesh::establish`], on a listener the caller already bound.
    ///
    /// `config.bind_addr` is ignored.
    pub async fn establish_on(
        mut listener: WebSocketListener,
        config: MeshConfig,
        local: PeerAddress,
        peers: &[PeerAddress],
    ) -> Self {
        let remote: BTreeSet<PeerAddress> =
            peers.iter().filter(|p| **p != local).cloned().collect();

        // The smaller address of each pair dials, so every pair ends up
        // with exactly one link.
        let dial_to: Vec<PeerAddress> = remote.iter().filter(|p| local < **p).cloned().collect();
        let accept_from: BTreeSet<PeerAddress> =
            remote.iter().filter(|p| **p < local).cloned().collect();

        tracing::info!(
            %local,
            dialing = dial_to.len(),
            accepting = accept_from.len(),
            "establishing mesh"
        );

        let deadline = Instant::now() + config.join_timeout;
        let (dialed, accepted) = tokio::join!(
            dial_all(&config, &local, dial_to, deadline),
            accept_all(&mut listener, &config, accept_from, deadline),
        );

        let (events_tx, events) = mpsc::unbounded_channel();
        let mut links = BTreeMap::new();
        for (peer, conn) in dialed.into_iter().chain(accepted) {
            let link = PeerLink::open(peer.clone(), conn, events_tx.clone());
            links.insert(peer, link);
        }
        for peer in remote {
            if !links.contains_key(&peer) {
                tracing::warn!(%peer, "peer never joined");
                let _ = events_tx.send(MeshEvent::PeerLost(peer.clone()));
                links.insert(peer.clone(), PeerLink::never_joined(peer));
            }
        }

        tracing::info!(
            %local,
            open = links.values().filter(|l| l.is_open()).count(),
            "mesh established"
        );
        Self {
            local,
            links,
            events,
            codec: JsonCodec,
        }
    }

    /// This peer's own address.
    pub fn local(&self) -> &PeerAddress {
        &self.local
    }

    /// Every configured remote peer, whether its link is open or not.
    pub fn peers(&self) -> impl Iterator<Item = &PeerAddress> {
        self.links.keys()
    }

    /// Remote peers whose link is currently open, in address order.
    pub fn live_peers(&self) -> Vec<PeerAddress> {
        self.links
            .values()
            .filter(|link| link.is_open())
            .map(|link| link.peer().clone())
            .collect()
    }

    pub fn link_state(&self, peer: &PeerAddress) -> Option<LinkState> {
        self.links.get(peer).map(PeerLink::state)
    }

    /// Queues `msg` on every open link and returns how many it went to.
    ///
    /// Never waits on the network. Links that turn out to be broken are
    /// reported through [`MeshEvent::PeerLost`], not here.
    pub fn broadcast(&self, msg: &TetrisMessage) -> Result<usize, MeshError> {
        let frame = self.codec.encode(msg)?;
        let sent = self
            .links
            .values()
            .filter(|link| link.enqueue(frame.clone()))
            .count();
        if matches!(msg, TetrisMessage::GameState { .. }) {
            tracing::trace!(kind = %msg.kind(), peers = sent, "broadcast");
        } else {
            tracing::debug!(kind = %msg.kind(), peers = sent, "broadcast");
        }
        Ok(sent)
    }

    /// Takes the next queued event without waiting.
    pub fn poll_inbound(&mut self) -> Option<MeshEvent> {
        self.events.try_recv().ok()
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once every link is closed and the queue is drained.
    pub async fn next_inbound(&mut self) -> Option<MeshEvent> {
        self.events.recv().await
    }

    /// Closes every link. Local closes are not reported as lost peers.
    /// Idempotent.
    pub async fn close(&mut self) {
        for link in self.links.values_mut() {
            link.close().await;
        }
        tracing::info!(local = %self.local, "mesh closed");
    }
}

/// Dials every peer in `targets` concurrently.
async fn dial_all(
    config: &MeshConfig,
    local: &PeerAddress,
    targets: Vec<PeerAddress>,
    deadline: Instant,
) -> Vec<(PeerAddress, WebSocketConnection)> {
    let mut tasks = JoinSet::new();
    for peer in targets {
        let config = config.clone();
        let local = local.clone();
        tasks.spawn(async move {
            let dialed = tokio::time::timeout_at(deadline, dial(&config, &local, &peer)).await;
            (peer, dialed)
        });
    }

    let mut out = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((peer, Ok(Ok(conn)))) => out.push((peer, conn)),
            Ok((peer, Ok(Err(e)))) => tracing::warn!(%peer, error = %e, "dial failed"),
            Ok((peer, Err(_))) => tracing::warn!(%peer, "dial timed out"),
            Err(e) => tracing::error!(error = %e, "dial task failed"),
        }
    }
    out
}

/// Connects to `peer`, retrying while it starts up, and sends our Hello.
async fn dial(
    config: &MeshConfig,
    local: &PeerAddress,
    peer: &PeerAddress,
) -> Result<WebSocketConnection, MeshError> {
    let attempts = config.dial_attempts.max(1);
    let mut attempt = 1;
    let conn = loop {
        match WebSocketConnection::connect(peer.as_str()).await {
            Ok(conn) => break conn,
            Err(source) if attempt >= attempts => {
                return Err(MeshError::Connection {
                    peer: peer.clone(),
                    source,
                });
            }
            Err(e) => {
                tracing::debug!(%peer, attempt, error = %e, "dial attempt failed");
                attempt += 1;
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    };

    let hello = JsonCodec.encode(&Hello::new(local.clone()))?;
    conn.send(&hello).await?;
    tracing::info!(%peer, attempt, "dialed peer");
    Ok(conn)
}

/// Accepts links from the peers in `expected` until all have arrived or
/// `deadline` passes.
async fn accept_all(
    listener: &mut WebSocketListener,
    config: &MeshConfig,
    mut expected: BTreeSet<PeerAddress>,
    deadline: Instant,
) -> Vec<(PeerAddress, WebSocketConnection)> {
    let mut out = Vec::new();
    while !expected.is_empty() {
        let conn = match tokio::time::timeout_at(deadline, listener.accept()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
            Err(_) => {
                tracing::warn!(missing = expected.len(), "gave up waiting for peers");
                break;
            }
        };

        let verdict = match read_hello(&conn, config).await {
            Ok(hello) if expected.remove(&hello.address) => Ok(hello.address),
            Ok(hello) => Err(MeshError::UnknownPeer(hello.address)),
            Err(e) => Err(e),
        };
        match verdict {
            Ok(peer) => {
                tracing::info!(%peer, conn_id = %conn.id(), "accepted peer");
                out.push((peer, conn));
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "rejecting link");
                let _ = conn.close().await;
            }
        }
    }
    out
}

async fn read_hello(conn: &WebSocketConnection, config: &MeshConfig) -> Result<Hello, MeshError> {
    let data = match tokio::time::timeout(config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(MeshError::HandshakeRejected(
                "connection closed before hello".into(),
            ));
        }
        Ok(Err(e)) => return Err(MeshError::Transport(e)),
        Err(_) => return Err(MeshError::HandshakeRejected("hello timed out".into())),
    };

    let hello: Hello = JsonCodec.decode(&data)?;
    if hello.version != PROTOCOL_VERSION {
        return Err(MeshError::HandshakeRejected(format!(
            "version mismatch: expected {PROTOCOL_VERSION}, got {}",
            hello.version
        )));
    }
    Ok(hello)
}
