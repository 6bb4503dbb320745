use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Match settings. Every peer should use the same board size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub board_width: i32,
    pub board_height: i32,

    /// Minimum time between two board snapshots sent to opponents.
    pub state_interval: Duration,

    /// Spend outgoing attack on pending incoming garbage first.
    pub cancel_garbage: bool,

    /// Shown to opponents in board snapshots.
    pub player_name: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            board_width: 10,
            board_height: 20,
            state_interval: Duration::from_millis(100),
            cancel_garbage: false,
            player_name: "player".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_config_default() {
        let config = MatchConfig::default();
        assert_eq!((config.board_width, config.board_height), (10, 20));
        assert!(!config.cancel_garbage);
    }

    #[test]
    fn test_match_config_fills_missing_fields() {
        let config: MatchConfig = serde_json::from_str(r#"{"cancel_garbage":true}"#).unwrap();
        assert!(config.cancel_garbage);
        assert_eq!(config.board_width, 10);
    }
}
