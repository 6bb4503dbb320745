//! In-match rules for meshtris.
//!
//! - [`MatchEngine`] turns local events (clears, locks, overflow) into
//!   messages for the other peers, and applies theirs: garbage, losses,
//!   board snapshots and results.
//! - [`attack`] and [`ComboTracker`] size the garbage a clear sends.
//! - [`Board`] is the minimal local board the engine needs.
//! - [`PieceSequence`] yields the same pieces on every peer for one seed.
//!
//! Everything here is synchronous. The caller owns the clock and the
//! network.

mod board;
mod combo;
mod config;
mod engine;
mod error;
mod pieces;
mod results;

pub use board::{Board, EMPTY, GARBAGE};
pub use combo::{BASE_ATTACK, COMBO_BONUS, ComboTracker, attack};
pub use config::MatchConfig;
pub use engine::{GarbageApplied, MatchEngine, MatchPhase, MatchStats};
pub use error::MatchError;
pub use pieces::PieceSequence;
pub use results::{Outcome, Standing, encode_results, parse_results};
