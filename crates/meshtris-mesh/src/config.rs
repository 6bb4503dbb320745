//! Mesh configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the mesh finds its peers at start-up.
///
/// Dial retries cover peers that start a little later than us. They are
/// only used while the mesh is being established; a link that closes
/// afterwards stays closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Socket address to listen on. `None` listens on the local peer
    /// address itself.
    pub bind_addr: Option<String>,

    /// Dial attempts per peer before it is given up on.
    pub dial_attempts: u32,

    /// Pause between two dial attempts.
    pub retry_delay: Duration,

    /// How long to wait for peers that dial us.
    pub join_timeout: Duration,

    /// How long an accepted connection may take to send its Hello.
    pub handshake_timeout: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            dial_attempts: 50,
            retry_delay: Duration::from_millis(200),
            join_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_config_default() {
        let config = MeshConfig::default();
        assert!(config.bind_addr.is_none());
        assert_eq!(config.dial_attempts, 50);
        assert_eq!(config.join_timeout, Duration::from_secs(15));
    }
}
