//! Error types for the lobby.

use std::time::Duration;

use crate::LobbyPhase;

/// Errors that end or misuse a lobby.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// Not every peer became ready within the configured window.
    #[error("lobby timed out after {0:?}")]
    Timeout(Duration),

    /// The local player quit before the match started.
    #[error("lobby aborted")]
    Aborted,

    /// Every configured peer disconnected before the match started.
    #[error("no peers left in the lobby")]
    NoPeersLeft,

    /// The operation is not valid in the current phase.
    #[error("cannot {op} while {phase}")]
    InvalidTransition {
        phase: LobbyPhase,
        op: &'static str,
    },
}
