//! Peer identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The `host:port` a peer listens on. It is the peer's identity for the
/// whole match: links, ready flags, loss records and board snapshots are
/// all keyed by it.
///
/// Addresses are compared on their canonical form (surrounding whitespace
/// trimmed, host lowercased), and ordered lexicographically. The ordering
/// decides which side of a peer pair dials and feeds seed derivation, so
/// every peer must see the same order for the same configuration.
///
/// `#[serde(try_from = "String")]` runs [`PeerAddress::parse`] on every
/// decoded address, so an address received off the wire is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Parses and canonicalizes a `host:port` string.
    ///
    /// IPv6 hosts must be bracketed (`[::1]:7000`).
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| ProtocolError::InvalidAddress(raw.to_string()))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(ProtocolError::InvalidAddress(raw.to_string()));
        }
        if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
            return Err(ProtocolError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("{}:{}", host.to_ascii_lowercase(), port)))
    }

    /// The canonical `host:port` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The port component.
    pub fn port(&self) -> u16 {
        // Validated in `parse`, the only constructor.
        self.0
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PeerAddress> for String {
    fn from(value: PeerAddress) -> Self {
        value.0
    }
}
