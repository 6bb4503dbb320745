//! Wire protocol for meshtris.
//!
//! This crate defines what peers say to each other:
//!
//! - **Messages** ([`TetrisMessage`], [`BoardState`]) that travel on
//!   every link once it is open.
//! - **Identity** ([`PeerAddress`]) keying links, ready flags and losses.
//! - **Handshake** ([`Hello`]) that opens a link.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) turning all of the above
//!   into bytes.
//!
//! It knows nothing about sockets or game rules.
//!
//! ```text
//! Transport (bytes) → Protocol (TetrisMessage) → Mesh / Lobby / Match
//! ```

mod address;
mod board;
mod codec;
mod error;
mod frame;
mod message;

pub use address::PeerAddress;
pub use board::{ActivePiece, BoardState, PieceType};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use frame::{Hello, PROTOCOL_VERSION};
pub use message::{AttackTally, MessageType, TetrisMessage, WireMessage};
