//! Pre-match coordination for meshtris.
//!
//! The [`Lobby`] tracks which peers are ready and fixes the shared seed
//! once all of them are. The seed is not negotiated: every peer derives it
//! from the configured address set with [`derive_seed`], and the Start
//! message carries it so a late peer can cross-check.
//!
//! After a match the same links can host another one: [`Lobby::rematch`]
//! starts a fresh lobby for the next round over the peers still
//! connected.
//!
//! The lobby is a plain state machine. Driving it from mesh events and
//! enforcing [`LobbyConfig::ready_timeout`] is up to the caller.

mod config;
mod error;
mod lobby;
mod seed;

pub use config::LobbyConfig;
pub use error::LobbyError;
pub use lobby::{Lobby, LobbyPhase, MatchReady, MatchStart};
pub use seed::{derive_round_seed, derive_seed};
