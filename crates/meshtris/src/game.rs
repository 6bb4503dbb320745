//! The seam between the protocol and an actual game.

use std::time::Duration;

use meshtris_match::MatchEngine;

/// Something that happened on the local board during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEvent {
    /// A piece locked and cleared `lines_cleared` rows (possibly 0).
    PieceLocked { lines_cleared: u32 },

    /// The board topped out on its own, e.g. a new piece had no room to
    /// spawn.
    Overflow,
}

/// A locally played game.
///
/// Implementors own input, piece movement and collision. They read and
/// write the board through [`MatchEngine::board_mut`] and draw pieces
/// from [`MatchEngine::next_piece`]; the driver turns the events they
/// return into messages for the other peers.
pub trait LocalGame: Send {
    /// Called once before the first step.
    fn on_start(&mut self, _engine: &mut MatchEngine) {}

    /// Advances the game by one tick of `dt`.
    ///
    /// Only called while the local player is still in the game.
    fn step(&mut self, dt: Duration, engine: &mut MatchEngine) -> Vec<LocalEvent>;
}
