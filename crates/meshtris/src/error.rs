//! Unified error type for meshtris.

use meshtris_lobby::LobbyError;
use meshtris_match::MatchError;
use meshtris_mesh::MeshError;
use meshtris_protocol::ProtocolError;
use meshtris_transport::TransportError;

/// Top-level error wrapping every crate's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum MeshtrisError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Building the mesh or sending on it failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// The lobby timed out, was aborted, or lost every peer.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    #[error(transparent)]
    Match(#[from] MatchError),

    /// The builder is missing something it needs.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: MeshtrisError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, MeshtrisError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: MeshtrisError = ProtocolError::InvalidAddress("x".into()).into();
        assert!(matches!(err, MeshtrisError::Protocol(_)));
    }

    #[test]
    fn test_from_lobby_error() {
        let err: MeshtrisError = LobbyError::Aborted.into();
        assert!(matches!(err, MeshtrisError::Lobby(LobbyError::Aborted)));
        assert_eq!(err.to_string(), "lobby aborted");
    }

    #[test]
    fn test_from_match_error() {
        let err: MeshtrisError = MatchError::NotPlaying.into();
        assert!(matches!(err, MeshtrisError::Match(_)));
    }

    #[test]
    fn test_from_mesh_error() {
        let err: MeshtrisError = MeshError::HandshakeRejected("v2".into()).into();
        assert!(matches!(err, MeshtrisError::Mesh(_)));
    }
}
