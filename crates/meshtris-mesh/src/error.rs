//! Error types for the mesh layer.

use meshtris_protocol::{PeerAddress, ProtocolError};
use meshtris_transport::TransportError;

/// Errors that can occur while building or using the mesh.
///
/// Apart from [`MeshError::Bind`], none of these is fatal for the mesh as
/// a whole: a failed dial or a rejected handshake loses one peer, and the
/// others carry on.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// The local listener could not be bound.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: TransportError,
    },

    /// Every dial attempt to a peer failed.
    #[error("cannot connect to {peer}: {source}")]
    Connection {
        peer: PeerAddress,
        #[source]
        source: TransportError,
    },

    /// The link to a peer broke after it was open.
    #[error("link to {peer} closed: {reason}")]
    Stream { peer: PeerAddress, reason: String },

    /// The first frame on an accepted link was not an acceptable Hello.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// A Hello named an address outside the configured peer list.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerAddress),

    /// Encoding an outbound message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
