//! Peer links and the full mesh for meshtris.
//!
//! Every participant holds a direct [`PeerLink`] to every other one. The
//! [`Mesh`] owns those links, broadcasts to all of them, and merges their
//! inbound traffic into one queue of [`MeshEvent`]s.
//!
//! ```text
//! Transport (WebSocketConnection) → PeerLink → Mesh → Lobby / Match
//! ```
//!
//! There is no reconnection: a link that closes stays closed and its peer
//! is reported lost exactly once.

mod config;
mod error;
mod link;
mod mesh;

pub use config::MeshConfig;
pub use error::MeshError;
pub use link::{LinkState, PeerLink};
pub use mesh::{Mesh, MeshEvent};
