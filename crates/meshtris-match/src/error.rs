//! Error types for the match engine.

/// Errors that can occur while running a match.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A local game event arrived after the local player lost, or after
    /// results were published.
    #[error("local player is no longer playing")]
    NotPlaying,

    /// The configured board cannot exist.
    #[error("invalid board dimensions {width}x{height}")]
    InvalidBoard { width: i32, height: i32 },

    /// The results payload could not be built or read.
    #[error("results payload: {0}")]
    Results(#[from] serde_json::Error),
}
