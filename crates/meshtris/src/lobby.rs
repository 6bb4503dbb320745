//! Async lobby driver.

use std::time::Duration;

use meshtris_lobby::{Lobby, LobbyError, MatchStart};
use meshtris_mesh::{Mesh, MeshEvent};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{MeshtrisError, NodeCommand};

/// Runs `lobby` until the seed is agreed, then broadcasts Start.
///
/// Waits on local commands, mesh events and the optional ready timeout
/// at the same time.
pub(crate) async fn drive_lobby(
    mesh: &mut Mesh,
    lobby: &mut Lobby,
    commands: &mut mpsc::UnboundedReceiver<NodeCommand>,
    ready_timeout: Option<Duration>,
) -> Result<MatchStart, MeshtrisError> {
    let deadline = ready_timeout.map(|t| (Instant::now() + t, t));
    let timeout = async {
        match deadline {
            Some((at, window)) => {
                tokio::time::sleep_until(at).await;
                window
            }
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timeout);

    let mut commands_open = true;
    let mut inbound_open = true;

    loop {
        let agreed = tokio::select! {
            window = &mut timeout => {
                lobby.abort();
                tracing::warn!(waiting_on = ?lobby.waiting_on(), "lobby timed out");
                return Err(LobbyError::Timeout(window).into());
            }
            cmd = commands.recv(), if commands_open => match cmd {
                Some(NodeCommand::Ready) => {
                    let (ready, agreed) = lobby.on_local_ready()?;
                    if let Some(msg) = ready {
                        mesh.broadcast(&msg)?;
                    }
                    agreed
                }
                Some(NodeCommand::Quit) => return Err(lobby.abort().into()),
                None => {
                    commands_open = false;
                    None
                }
            },
            event = mesh.next_inbound(), if inbound_open => match event {
                Some(MeshEvent::Message { from, msg }) => lobby.on_message(&from, msg)?,
                Some(MeshEvent::PeerLost(peer)) => lobby.on_peer_lost(&peer)?,
                None => {
                    inbound_open = false;
                    None
                }
            },
        };

        if agreed.is_some() {
            let start = lobby.enter_match()?;
            mesh.broadcast(&start.announce)?;
            return Ok(start);
        }
        if !commands_open && !inbound_open && deadline.is_none() {
            // Nothing can move the lobby forward any more.
            return Err(lobby.abort().into());
        }
    }
}
