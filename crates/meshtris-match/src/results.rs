//! The final ranking carried by GameResults.

use meshtris_protocol::{AttackTally, PeerAddress};
use serde::{Deserialize, Serialize};

use crate::MatchError;

/// How a participant's match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Won,
    Lost,
    Disconnected,
}

/// One line of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1 is best.
    pub rank: u32,
    pub peer: PeerAddress,
    pub outcome: Outcome,
    pub score: i32,
    /// Garbage lines this player sent. Zero when unknown.
    #[serde(default)]
    pub lines_sent: u32,
    /// Garbage lines queued against this player. Zero when unknown.
    #[serde(default)]
    pub lines_received: u32,
}

/// A participant leaving the match, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Elimination {
    pub(crate) peer: PeerAddress,
    pub(crate) outcome: Outcome,
    pub(crate) score: i32,
    pub(crate) attacks: AttackTally,
}

/// Ranks the winner (if any) first, then the eliminated participants,
/// last out ranked highest.
pub(crate) fn rank(winner: Option<&Elimination>, eliminated: &[Elimination]) -> Vec<Standing> {
    winner
        .into_iter()
        .chain(eliminated.iter().rev())
        .zip(1..)
        .map(|(e, rank)| Standing {
            rank,
            peer: e.peer.clone(),
            outcome: e.outcome,
            score: e.score,
            lines_sent: e.attacks.sent,
            lines_received: e.attacks.received,
        })
        .collect()
}

/// Serializes standings into the `results` string.
pub fn encode_results(standings: &[Standing]) -> Result<String, MatchError> {
    Ok(serde_json::to_string(standings)?)
}

/// Reads a `results` string back.
pub fn parse_results(results: &str) -> Result<Vec<Standing>, MatchError> {
    Ok(serde_json::from_str(results)?)
}
