//! # Meshtris
//!
//! Serverless multiplayer Tetris coordination.
//!
//! Every participant runs a [`PeerNode`]. The nodes connect to each other
//! directly, agree on a shared piece seed in the lobby, and then play a
//! match where cleared lines become garbage for opponents. The last player
//! standing publishes the final ranking.
//!
//! After the results the links stay up. [`PeerNode::next_round`] opens a
//! fresh lobby over them for a rematch.
//!
//! The game itself (input, piece movement, collision) is yours: implement
//! [`LocalGame`] and the node does the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshtris::prelude::*;
//!
//! // Implement LocalGame for your game, then:
//! // let node = PeerNode::builder()
//! //     .local("127.0.0.1:7000")
//! //     .peers(["127.0.0.1:7000", "127.0.0.1:7001"])
//! //     .connect()
//! //     .await?;
//! // node.handle().ready();
//! // let summary = node.run(&mut MyGame::default()).await?;
//! ```

mod config;
mod error;
mod game;
mod lobby;
mod node;
mod session;

pub use config::PeerConfig;
pub use error::MeshtrisError;
pub use game::{LocalEvent, LocalGame};
pub use node::{NodeCommand, NodeHandle, PeerNode, PeerNodeBuilder};
pub use session::MatchSummary;

pub use meshtris_lobby::{
    LobbyConfig, LobbyError, LobbyPhase, MatchStart, derive_round_seed, derive_seed,
};
pub use meshtris_match::{
    Board, EMPTY, GARBAGE, MatchConfig, MatchEngine, MatchError, MatchPhase, MatchStats, Outcome,
    Standing,
};
pub use meshtris_mesh::{MeshConfig, MeshError};
pub use meshtris_protocol::{
    ActivePiece, AttackTally, BoardState, PeerAddress, PieceType, TetrisMessage,
};
pub use meshtris_tick::{OverrunPolicy, TickConfig};
pub use meshtris_transport::WebSocketListener;

pub mod prelude {
    pub use crate::{
        LocalEvent, LocalGame, MatchSummary, MeshtrisError, NodeHandle, PeerConfig, PeerNode,
    };
    pub use crate::{Board, MatchEngine, Outcome, PeerAddress, PieceType, Standing};
}
