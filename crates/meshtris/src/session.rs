//! Async match driver.
//!
//! Single writer: only this loop touches the [`MatchEngine`]. Link tasks
//! just enqueue, and the queue is drained once per tick.

use meshtris_lobby::MatchStart;
use meshtris_match::{MatchEngine, MatchPhase, MatchStats, Standing, parse_results};
use meshtris_mesh::{Mesh, MeshEvent};
use meshtris_protocol::{PeerAddress, TetrisMessage};
use meshtris_tick::TickClock;
use tokio::sync::mpsc;

use crate::{LocalEvent, LocalGame, MeshtrisError, NodeCommand};

/// How a match ended for this peer.
#[derive(Debug, Clone)]
pub struct MatchSummary {
    pub seed: i32,
    /// 0 for the first match over these links, then one more per rematch.
    pub round: u32,
    /// The final ranking, if results were published or received.
    pub standings: Option<Vec<Standing>>,
    pub stats: MatchStats,
    /// The local player quit before results were known.
    pub quit: bool,
}

impl MatchSummary {
    /// The ranking line of `peer`.
    pub fn standing_of(&self, peer: &PeerAddress) -> Option<&Standing> {
        self.standings.as_ref()?.iter().find(|s| s.peer == *peer)
    }
}

/// Replays what the lobby held back, then ticks until results are known
/// or the local player quits.
pub(crate) async fn drive_match<G: LocalGame>(
    mesh: &mut Mesh,
    engine: &mut MatchEngine,
    clock: &mut TickClock,
    game: &mut G,
    commands: &mut mpsc::UnboundedReceiver<NodeCommand>,
    start: MatchStart,
) -> Result<MatchSummary, MeshtrisError> {
    for peer in &start.departed {
        let out = engine.on_peer_lost(peer)?;
        broadcast(mesh, out)?;
    }
    for (from, msg) in start.early {
        let out = engine.on_message(&from, msg)?;
        broadcast(mesh, out)?;
    }
    game.on_start(engine);

    let mut commands_open = true;
    let mut quit = false;

    while engine.phase() != MatchPhase::ResultsKnown {
        tokio::select! {
            cmd = commands.recv(), if commands_open => match cmd {
                Some(NodeCommand::Quit) => {
                    tracing::info!(local = %engine.local(), "quitting match");
                    if engine.is_playing() {
                        let out = engine.on_board_overflow()?;
                        broadcast(mesh, out)?;
                    }
                    quit = true;
                    break;
                }
                Some(NodeCommand::Ready) => {}
                None => commands_open = false,
            },
            tick = clock.tick() => {
                drain_inbound(mesh, engine)?;

                if engine.is_playing() {
                    let events = game.step(tick.dt, engine);
                    for event in events {
                        apply_local(mesh, engine, event)?;
                    }
                }

                let snapshots = engine.on_tick(tick.now);
                broadcast(mesh, snapshots)?;
                clock.finish_tick();
            }
        }
    }

    let standings = engine.results().and_then(|raw| match parse_results(raw) {
        Ok(standings) => Some(standings),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable results");
            None
        }
    });
    tracing::info!(
        local = %engine.local(),
        round = start.round,
        quit,
        stats = ?engine.stats(),
        "match over"
    );

    Ok(MatchSummary {
        seed: start.seed,
        round: start.round,
        standings,
        stats: engine.stats(),
        quit,
    })
}

/// Applies queued events until the queue is empty or results are known.
/// What arrives after the results stays queued for the next lobby.
fn drain_inbound(mesh: &mut Mesh, engine: &mut MatchEngine) -> Result<(), MeshtrisError> {
    while engine.phase() != MatchPhase::ResultsKnown {
        let Some(event) = mesh.poll_inbound() else {
            break;
        };
        let out = match event {
            MeshEvent::Message { from, msg } => engine.on_message(&from, msg)?,
            MeshEvent::PeerLost(peer) => engine.on_peer_lost(&peer)?,
        };
        broadcast(mesh, out)?;
    }
    Ok(())
}

fn apply_local(
    mesh: &Mesh,
    engine: &mut MatchEngine,
    event: LocalEvent,
) -> Result<(), MeshtrisError> {
    // An earlier event in the same step may already have ended our game.
    if !engine.is_playing() {
        return Ok(());
    }
    match event {
        LocalEvent::PieceLocked { lines_cleared } => {
            let out = engine.on_lines_cleared(lines_cleared)?;
            broadcast(mesh, out)?;
            if engine.on_piece_locked()?.overflow {
                let out = engine.on_board_overflow()?;
                broadcast(mesh, out)?;
            }
        }
        LocalEvent::Overflow => {
            let out = engine.on_board_overflow()?;
            broadcast(mesh, out)?;
        }
    }
    Ok(())
}

fn broadcast(mesh: &Mesh, out: Vec<TetrisMessage>) -> Result<(), MeshtrisError> {
    for msg in &out {
        mesh.broadcast(msg)?;
    }
    Ok(())
}
