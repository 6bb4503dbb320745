//! Whole-node configuration.

use meshtris_lobby::LobbyConfig;
use meshtris_match::MatchConfig;
use meshtris_mesh::MeshConfig;
use meshtris_tick::TickConfig;
use serde::{Deserialize, Serialize};

/// Everything one peer needs to join a match.
///
/// Missing sections fall back to their defaults, so a config file only
/// has to name what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Our own `host:port`. It is both the listen address and our
    /// identity on the mesh.
    pub local: String,

    /// Every participant's address. May include `local`.
    pub peers: Vec<String>,

    pub mesh: MeshConfig,
    pub lobby: LobbyConfig,
    #[serde(rename = "match")]
    pub game: MatchConfig,
    pub tick: TickConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "local": "127.0.0.1:7000",
            "peers": ["127.0.0.1:7000", "127.0.0.1:7001"],
            "match": { "cancel_garbage": true }
        }"#;
        let config: PeerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.peers.len(), 2);
        assert!(config.game.cancel_garbage);
        assert_eq!(config.game.board_width, 10);
        assert_eq!(config.tick.rate_hz, 60);
        assert!(config.lobby.ready_timeout.is_none());
    }
}
