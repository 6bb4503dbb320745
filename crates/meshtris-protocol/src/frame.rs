//! The link handshake.
//!
//! The first frame on every link is a [`Hello`] from the dialing side.
//! Every frame after it carries exactly one
//! [`TetrisMessage`](crate::TetrisMessage).

use serde::{Deserialize, Serialize};

use crate::PeerAddress;

/// Bumped whenever the message model changes incompatibly.
pub const PROTOCOL_VERSION: u32 = 1;

/// Identifies the dialer to the accepting side.
///
/// The accepting side only learns the dialer's ephemeral socket address
/// from TCP, so the dialer names the listening address it was configured
/// with. That address is what the link is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub version: u32,
    pub address: PeerAddress,
}

impl Hello {
    pub fn new(address: PeerAddress) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            address,
        }
    }
}
