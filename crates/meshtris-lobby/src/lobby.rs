//! The lobby state machine.

use std::collections::BTreeMap;
use std::fmt;

use meshtris_protocol::{PeerAddress, TetrisMessage};

use crate::{LobbyError, derive_round_seed};

/// The lifecycle of a lobby.
///
/// ```text
/// AwaitingReady → SeedAgreed → InMatch
///       └──────────────┴──────→ Aborted
/// ```
///
/// - **AwaitingReady**: collecting Ready from every required peer.
/// - **SeedAgreed**: everyone is ready and the seed is fixed. The owner
///   should call [`Lobby::enter_match`].
/// - **InMatch**: the lobby has handed over to the match.
/// - **Aborted**: the local player quit, or nobody is left to play with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    AwaitingReady,
    SeedAgreed,
    InMatch,
    Aborted,
}

impl fmt::Display for LobbyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingReady => write!(f, "AwaitingReady"),
            Self::SeedAgreed => write!(f, "SeedAgreed"),
            Self::InMatch => write!(f, "InMatch"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Reported when the lobby reaches [`LobbyPhase::SeedAgreed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchReady {
    pub seed: i32,
}

/// Everything the match needs from the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStart {
    pub seed: i32,

    /// Matches played over the same links before this one.
    pub round: u32,

    /// The Start to broadcast to the other peers.
    pub announce: TetrisMessage,

    /// Everyone this lobby was opened for, self included, in address
    /// order. Peers that left before the match are still listed.
    pub participants: Vec<PeerAddress>,

    /// Participants whose link broke before the match started.
    pub departed: Vec<PeerAddress>,

    /// Match traffic from peers that started before us, in arrival order.
    pub early: Vec<(PeerAddress, TetrisMessage)>,
}

/// Gets every peer from connected to playing the same match.
///
/// Pure state: it does no I/O and keeps no clock. The caller feeds it
/// local input and mesh events, broadcasts what it returns, and enforces
/// any timeout.
#[derive(Debug)]
pub struct Lobby {
    local: PeerAddress,
    phase: LobbyPhase,
    round: u32,

    /// Required peers and their ready flags, self included. A peer that
    /// disconnects before agreement is removed and moves to `departed`.
    ready: BTreeMap<PeerAddress, bool>,

    /// Whether any remote peer was configured at all.
    has_remotes: bool,

    /// Derived from the configured set, not the survivors, so peers that
    /// see a disconnect at different moments still agree.
    computed_seed: i32,
    seed: Option<i32>,

    departed: Vec<PeerAddress>,
    early: Vec<(PeerAddress, TetrisMessage)>,
}

impl Lobby {
    /// Creates a lobby for `local` among the configured `peers`.
    ///
    /// `peers` may or may not contain `local`.
    pub fn new(local: PeerAddress, peers: &[PeerAddress]) -> Self {
        Self::build(local, peers, peers, 0)
    }

    /// Opens round `round` over the same configuration after a match.
    ///
    /// Only `live` peers, whose links are still open, are waited for. The
    /// seed still covers every configured peer so that peers with a
    /// different view of who is left deal the same pieces.
    ///
    /// # Errors
    /// [`LobbyError::NoPeersLeft`] if remote peers were configured but
    /// none of them is live.
    pub fn rematch(
        local: PeerAddress,
        configured: &[PeerAddress],
        live: &[PeerAddress],
        round: u32,
    ) -> Result<Self, LobbyError> {
        let lobby = Self::build(local, configured, live, round);
        if lobby.has_remotes && lobby.ready.len() == 1 {
            return Err(LobbyError::NoPeersLeft);
        }
        tracing::info!(local = %lobby.local, round, players = lobby.ready.len(), "rematch lobby open");
        Ok(lobby)
    }

    fn build(local: PeerAddress, configured: &[PeerAddress], live: &[PeerAddress], round: u32) -> Self {
        let mut ready: BTreeMap<PeerAddress, bool> = live.iter().map(|p| (p.clone(), false)).collect();
        ready.insert(local.clone(), false);
        let computed_seed = derive_round_seed(configured.iter().chain([&local]), round);

        Self {
            has_remotes: configured.iter().any(|p| *p != local),
            local,
            phase: LobbyPhase::AwaitingReady,
            round,
            ready,
            computed_seed,
            seed: None,
            departed: Vec::new(),
            early: Vec::new(),
        }
    }

    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    pub fn local(&self) -> &PeerAddress {
        &self.local
    }

    /// How many matches were played over these links before this one.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// The agreed seed, once there is one.
    pub fn seed(&self) -> Option<i32> {
        self.seed
    }

    pub fn is_ready(&self, peer: &PeerAddress) -> bool {
        self.ready.get(peer).copied().unwrap_or(false)
    }

    /// Peers whose Ready is still needed, self included.
    pub fn required(&self) -> impl Iterator<Item = &PeerAddress> {
        self.ready.keys()
    }

    /// Peers that have not sent Ready yet.
    pub fn waiting_on(&self) -> Vec<PeerAddress> {
        self.ready
            .iter()
            .filter(|(_, ready)| !**ready)
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    /// The local player is ready.
    ///
    /// Returns the Ready to broadcast the first time, and nothing on
    /// repeats. The second element reports agreement if this was the last
    /// missing Ready.
    pub fn on_local_ready(
        &mut self,
    ) -> Result<(Option<TetrisMessage>, Option<MatchReady>), LobbyError> {
        match self.phase {
            LobbyPhase::AwaitingReady => {}
            LobbyPhase::SeedAgreed => return Ok((None, None)),
            phase => {
                return Err(LobbyError::InvalidTransition {
                    phase,
                    op: "mark ready",
                });
            }
        }
        if self.is_ready(&self.local) {
            return Ok((None, None));
        }

        self.ready.insert(self.local.clone(), true);
        tracing::info!(local = %self.local, waiting = self.waiting_on().len(), "ready");
        Ok((Some(TetrisMessage::Ready), self.check_agreement()))
    }

    /// Handles a message from `from` that arrived before the match.
    pub fn on_message(
        &mut self,
        from: &PeerAddress,
        msg: TetrisMessage,
    ) -> Result<Option<MatchReady>, LobbyError> {
        if matches!(self.phase, LobbyPhase::InMatch | LobbyPhase::Aborted) {
            return Err(LobbyError::InvalidTransition {
                phase: self.phase,
                op: "handle a message",
            });
        }

        match msg {
            TetrisMessage::Ready => {
                self.mark_ready(from);
                Ok(self.check_agreement())
            }
            TetrisMessage::Start { seed } if self.round > 0 && seed != self.computed_seed => {
                tracing::debug!(%from, seed, round = self.round, "dropping start of another round");
                Ok(None)
            }
            TetrisMessage::Start { seed } => {
                // Whoever sends Start has seen everyone ready.
                self.mark_ready(from);
                Ok(self.on_start(from, seed))
            }
            // A peer sends Ready before any traffic of the match it is
            // ready for, so anything else from a peer not yet ready is
            // left over from the previous round.
            other if self.is_ready(from) => {
                tracing::debug!(%from, kind = %other.kind(), "holding early match message");
                self.early.push((from.clone(), other));
                Ok(None)
            }
            other => {
                tracing::debug!(%from, kind = %other.kind(), "dropping stale match message");
                Ok(None)
            }
        }
    }

    /// The link to `peer` closed.
    ///
    /// Before agreement the peer stops being required. Either way it stays
    /// a participant and is handed to the match as departed, so every peer
    /// starts the match with the same participant set.
    pub fn on_peer_lost(&mut self, peer: &PeerAddress) -> Result<Option<MatchReady>, LobbyError> {
        match self.phase {
            LobbyPhase::AwaitingReady => {
                if self.ready.remove(peer).is_none() {
                    return Ok(None);
                }
                tracing::warn!(%peer, "peer left the lobby");
                self.departed.push(peer.clone());
                if self.has_remotes && self.ready.len() == 1 {
                    self.phase = LobbyPhase::Aborted;
                    return Err(LobbyError::NoPeersLeft);
                }
                Ok(self.check_agreement())
            }
            LobbyPhase::SeedAgreed => {
                if self.ready.contains_key(peer) && !self.departed.contains(peer) {
                    tracing::warn!(%peer, "peer left before the match started");
                    self.departed.push(peer.clone());
                }
                Ok(None)
            }
            phase => Err(LobbyError::InvalidTransition {
                phase,
                op: "drop a peer",
            }),
        }
    }

    /// Moves to [`LobbyPhase::InMatch`] and hands over to the match.
    pub fn enter_match(&mut self) -> Result<MatchStart, LobbyError> {
        let seed = match (self.phase, self.seed) {
            (LobbyPhase::SeedAgreed, Some(seed)) => seed,
            (phase, _) => {
                return Err(LobbyError::InvalidTransition {
                    phase,
                    op: "enter the match",
                });
            }
        };
        self.phase = LobbyPhase::InMatch;
        let mut participants: Vec<PeerAddress> =
            self.ready.keys().chain(&self.departed).cloned().collect();
        participants.sort_unstable();
        participants.dedup();
        tracing::info!(
            local = %self.local,
            seed,
            round = self.round,
            players = participants.len(),
            "entering match"
        );

        Ok(MatchStart {
            seed,
            round: self.round,
            announce: TetrisMessage::Start { seed },
            participants,
            departed: std::mem::take(&mut self.departed),
            early: std::mem::take(&mut self.early),
        })
    }

    /// The local player quit. Idempotent.
    pub fn abort(&mut self) -> LobbyError {
        if self.phase != LobbyPhase::Aborted {
            tracing::info!(local = %self.local, phase = %self.phase, "lobby aborted");
            self.phase = LobbyPhase::Aborted;
        }
        LobbyError::Aborted
    }

    fn mark_ready(&mut self, peer: &PeerAddress) {
        match self.ready.get_mut(peer) {
            Some(flag) if !*flag => {
                *flag = true;
                tracing::debug!(%peer, waiting = self.waiting_on().len(), "peer ready");
            }
            Some(_) => {}
            None => tracing::warn!(%peer, "ready from a peer outside the lobby"),
        }
    }

    fn on_start(&mut self, from: &PeerAddress, seed: i32) -> Option<MatchReady> {
        if seed != self.computed_seed {
            tracing::warn!(
                %from,
                received = seed,
                local = self.computed_seed,
                "seed disagreement, keeping local seed"
            );
        }
        match self.phase {
            LobbyPhase::AwaitingReady if self.is_ready(&self.local) => {
                tracing::info!(%from, "start received, following");
                Some(self.agree())
            }
            LobbyPhase::AwaitingReady => {
                tracing::debug!(%from, "start received before local ready");
                None
            }
            _ => None,
        }
    }

    fn check_agreement(&mut self) -> Option<MatchReady> {
        if self.phase == LobbyPhase::AwaitingReady && self.ready.values().all(|r| *r) {
            Some(self.agree())
        } else {
            None
        }
    }

    fn agree(&mut self) -> MatchReady {
        self.phase = LobbyPhase::SeedAgreed;
        self.seed = Some(self.computed_seed);
        tracing::info!(local = %self.local, seed = self.computed_seed, "seed agreed");
        MatchReady {
            seed: self.computed_seed,
        }
    }
}
