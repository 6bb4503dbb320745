use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lobby settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Give up if not every peer is ready within this window.
    /// `None` waits forever.
    pub ready_timeout: Option<Duration>,
}
