//! The match protocol engine.
//!
//! Turns local game events into messages for the other peers and applies
//! their messages to local state. It does no I/O: every operation returns
//! the messages the caller should broadcast.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use meshtris_protocol::{AttackTally, BoardState, PeerAddress, PieceType, TetrisMessage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::results::{Elimination, rank};
use crate::{Board, ComboTracker, MatchConfig, MatchError, Outcome, PieceSequence, encode_results};

/// Where the local player stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// The local board is live.
    Playing,

    /// The local board overflowed. Inbound traffic is still processed.
    Lost,

    /// Results were published or received. Terminal.
    ResultsKnown,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing => write!(f, "Playing"),
            Self::Lost => write!(f, "Lost"),
            Self::ResultsKnown => write!(f, "ResultsKnown"),
        }
    }
}

/// Counters kept over one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub pieces_locked: u32,
    pub lines_cleared: u32,
    /// Garbage messages sent.
    pub attacks_sent: u32,
    /// Garbage lines sent across all attacks.
    pub lines_sent: u32,
    /// Garbage lines queued against us.
    pub garbage_received: u32,
    /// Incoming lines cancelled by our own attacks.
    pub lines_cancelled: u32,
}

/// What draining the garbage queue did to the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GarbageApplied {
    pub rows: u32,
    /// Blocks were pushed out of the top. The caller should report the
    /// overflow with [`MatchEngine::on_board_overflow`].
    pub overflow: bool,
}

type Outbound = Result<Vec<TetrisMessage>, MatchError>;

/// One peer's view of a running match.
#[derive(Debug)]
pub struct MatchEngine {
    config: MatchConfig,
    local: PeerAddress,
    seed: i32,
    phase: MatchPhase,

    /// Everyone who started the match, self included.
    participants: BTreeSet<PeerAddress>,
    /// Participants known to be out. Only grows.
    lost: BTreeSet<PeerAddress>,
    /// The same participants in the order they went out.
    eliminated: Vec<Elimination>,

    board: Board,
    pieces: PieceSequence,
    combo: ComboTracker,
    gaps: StdRng,
    incoming: VecDeque<u32>,

    opponents: BTreeMap<PeerAddress, BoardState>,

    dirty: bool,
    last_state_at: Option<Instant>,

    results: Option<String>,
    stats: MatchStats,
}

impl MatchEngine {
    /// Starts a match.
    ///
    /// `participants` may or may not contain `local`.
    pub fn new<I>(config: MatchConfig, local: PeerAddress, seed: i32, participants: I) -> Result<Self, MatchError>
    where
        I: IntoIterator<Item = PeerAddress>,
    {
        let board = Board::new(config.board_width, config.board_height)?;
        let mut participants: BTreeSet<PeerAddress> = participants.into_iter().collect();
        participants.insert(local.clone());

        tracing::info!(%local, seed, players = participants.len(), "match started");
        Ok(Self {
            config,
            local,
            seed,
            phase: MatchPhase::Playing,
            participants,
            lost: BTreeSet::new(),
            eliminated: Vec::new(),
            board,
            pieces: PieceSequence::new(seed),
            combo: ComboTracker::new(),
            gaps: StdRng::from_os_rng(),
            incoming: VecDeque::new(),
            opponents: BTreeMap::new(),
            dirty: true,
            last_state_at: None,
            results: None,
            stats: MatchStats::default(),
        })
    }

    pub fn local(&self) -> &PeerAddress {
        &self.local
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    pub fn participants(&self) -> impl Iterator<Item = &PeerAddress> {
        self.participants.iter()
    }

    /// Participants known to be out.
    pub fn lost(&self) -> &BTreeSet<PeerAddress> {
        &self.lost
    }

    /// Participants still in the game.
    pub fn alive(&self) -> Vec<PeerAddress> {
        self.participants.difference(&self.lost).cloned().collect()
    }

    /// The published or received results string.
    pub fn results(&self) -> Option<&str> {
        self.results.as_deref()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mutable access for the local game. Marks the board for the next
    /// snapshot.
    pub fn board_mut(&mut self) -> Result<&mut Board, MatchError> {
        self.ensure_playing()?;
        self.dirty = true;
        Ok(&mut self.board)
    }

    /// Next piece of the shared sequence.
    pub fn next_piece(&mut self) -> PieceType {
        self.pieces.next_piece()
    }

    /// Pending incoming garbage, oldest first.
    pub fn pending_garbage(&self) -> impl Iterator<Item = u32> + '_ {
        self.incoming.iter().copied()
    }

    /// Latest snapshot received from `peer`.
    pub fn opponent(&self, peer: &PeerAddress) -> Option<&BoardState> {
        self.opponents.get(peer)
    }

    pub fn opponents(&self) -> impl Iterator<Item = (&PeerAddress, &BoardState)> {
        self.opponents.iter()
    }

    // -- local events -----------------------------------------------------

    /// A lock cleared `lines` rows (0 for a lock that cleared nothing).
    ///
    /// Updates the combo streak and returns the attack, if any.
    pub fn on_lines_cleared(&mut self, lines: u32) -> Outbound {
        self.ensure_playing()?;
        let mut attack = self.combo.on_lock(lines);
        self.stats.lines_cleared = self.stats.lines_cleared.saturating_add(lines);
        if lines > 0 {
            self.dirty = true;
        }

        if self.config.cancel_garbage {
            attack = self.cancel_incoming(attack);
        }
        if attack == 0 {
            return Ok(Vec::new());
        }

        self.stats.attacks_sent = self.stats.attacks_sent.saturating_add(1);
        self.stats.lines_sent = self.stats.lines_sent.saturating_add(attack);
        tracing::debug!(
            lines,
            streak = ?self.combo.streak(),
            attack,
            "sending garbage"
        );
        Ok(vec![TetrisMessage::Garbage {
            amount: attack as i32,
            sender: self.local.clone(),
        }])
    }

    /// A piece locked: push all pending garbage into the board.
    pub fn on_piece_locked(&mut self) -> Result<GarbageApplied, MatchError> {
        self.ensure_playing()?;
        self.stats.pieces_locked = self.stats.pieces_locked.saturating_add(1);

        let mut applied = GarbageApplied::default();
        while let Some(lines) = self.incoming.pop_front() {
            applied.overflow |= self.board.insert_garbage(lines as usize, &mut self.gaps);
            applied.rows = applied.rows.saturating_add(lines);
        }
        if applied.rows > 0 {
            self.dirty = true;
            tracing::debug!(rows = applied.rows, overflow = applied.overflow, "garbage applied");
        }
        Ok(applied)
    }

    /// The local board overflowed. Broadcasts our loss; inbound traffic
    /// keeps being processed afterwards.
    pub fn on_board_overflow(&mut self) -> Outbound {
        self.ensure_playing()?;
        self.phase = MatchPhase::Lost;
        self.dirty = true;
        let score = self.board.score();
        tracing::info!(local = %self.local, score, "local board overflowed");

        let attacks = self.attack_tally();
        self.eliminate(self.local.clone(), Outcome::Lost, score, attacks);
        let mut out = vec![TetrisMessage::Lose {
            score,
            attacks: Some(attacks),
        }];
        out.extend(self.check_results()?);
        Ok(out)
    }

    /// Sends a board snapshot if the board changed and the interval has
    /// passed since the last one.
    pub fn on_tick(&mut self, now: Instant) -> Vec<TetrisMessage> {
        if self.phase == MatchPhase::ResultsKnown || !self.dirty {
            return Vec::new();
        }
        let due = self
            .last_state_at
            .is_none_or(|last| now.saturating_duration_since(last) >= self.config.state_interval);
        if !due {
            return Vec::new();
        }

        self.dirty = false;
        self.last_state_at = Some(now);
        vec![TetrisMessage::GameState {
            board_state: self.board.snapshot(&self.config.player_name),
        }]
    }

    /// Time until the next snapshot may be sent.
    pub fn state_due_in(&self, now: Instant) -> Duration {
        self.last_state_at.map_or(Duration::ZERO, |last| {
            self.config
                .state_interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }

    // -- remote events ----------------------------------------------------

    /// Applies a message from `from`.
    pub fn on_message(&mut self, from: &PeerAddress, msg: TetrisMessage) -> Outbound {
        match msg {
            TetrisMessage::Garbage { amount, sender } => {
                self.on_garbage_received(amount, &sender);
                Ok(Vec::new())
            }
            TetrisMessage::Lose { score, attacks } => self.on_lose_received(from, score, attacks),
            TetrisMessage::GameResults { results } => {
                self.on_results_received(from, results);
                Ok(Vec::new())
            }
            TetrisMessage::GameState { board_state } => {
                self.on_game_state(from, board_state);
                Ok(Vec::new())
            }
            TetrisMessage::Ready | TetrisMessage::Start { .. } => {
                tracing::trace!(%from, kind = %msg.kind(), "lobby message during match");
                Ok(Vec::new())
            }
        }
    }

    /// Queues incoming garbage. Our own garbage and non-positive amounts
    /// are dropped.
    pub fn on_garbage_received(&mut self, amount: i32, sender: &PeerAddress) {
        if *sender == self.local {
            tracing::debug!(amount, "ignoring own garbage");
            return;
        }
        if amount <= 0 {
            tracing::warn!(%sender, amount, "ignoring non-positive garbage");
            return;
        }
        if !self.is_playing() {
            return;
        }
        self.incoming.push_back(amount as u32);
        self.stats.garbage_received = self.stats.garbage_received.saturating_add(amount as u32);
        tracing::debug!(%sender, amount, pending = self.incoming.len(), "garbage queued");
    }

    /// `from` overflowed with final `score`. `attacks` is what it
    /// reported sending and receiving, if anything.
    pub fn on_lose_received(
        &mut self,
        from: &PeerAddress,
        score: i32,
        attacks: Option<AttackTally>,
    ) -> Outbound {
        if *from == self.local {
            return Ok(Vec::new());
        }
        self.eliminate(from.clone(), Outcome::Lost, score, attacks.unwrap_or_default());
        self.check_results()
    }

    /// The link to `peer` closed. Counts as a loss.
    pub fn on_peer_lost(&mut self, peer: &PeerAddress) -> Outbound {
        let score = self.opponents.get(peer).map_or(0, |b| b.score);
        self.eliminate(peer.clone(), Outcome::Disconnected, score, AttackTally::default());
        self.check_results()
    }

    pub fn on_game_state(&mut self, from: &PeerAddress, board_state: BoardState) {
        if *from == self.local {
            return;
        }
        self.opponents.insert(from.clone(), board_state);
    }

    pub fn on_results_received(&mut self, from: &PeerAddress, results: String) {
        if self.phase == MatchPhase::ResultsKnown {
            tracing::debug!(%from, "duplicate results ignored");
            return;
        }
        tracing::info!(%from, "results received");
        self.results = Some(results);
        self.phase = MatchPhase::ResultsKnown;
    }

    // -- internals --------------------------------------------------------

    fn ensure_playing(&self) -> Result<(), MatchError> {
        if self.is_playing() {
            Ok(())
        } else {
            Err(MatchError::NotPlaying)
        }
    }

    /// Spends `attack` on pending garbage, oldest first, and returns what
    /// is left to send.
    fn cancel_incoming(&mut self, mut attack: u32) -> u32 {
        while attack > 0 {
            let Some(front) = self.incoming.front_mut() else {
                break;
            };
            let cancelled = attack.min(*front);
            *front -= cancelled;
            attack -= cancelled;
            self.stats.lines_cancelled = self.stats.lines_cancelled.saturating_add(cancelled);
            if *front == 0 {
                self.incoming.pop_front();
            }
        }
        attack
    }

    /// Lines sent and received so far, as reported to the other peers.
    pub fn attack_tally(&self) -> AttackTally {
        AttackTally {
            sent: self.stats.lines_sent,
            received: self.stats.garbage_received,
        }
    }

    /// Records `peer` as out. The first report for a peer wins.
    fn eliminate(&mut self, peer: PeerAddress, outcome: Outcome, score: i32, attacks: AttackTally) {
        if !self.participants.contains(&peer) {
            tracing::warn!(%peer, "loss reported for a non-participant");
            return;
        }
        if !self.lost.insert(peer.clone()) {
            return;
        }
        tracing::info!(%peer, ?outcome, score, remaining = self.participants.len() - self.lost.len(), "participant out");
        self.eliminated.push(Elimination {
            peer,
            outcome,
            score,
            attacks,
        });
    }

    fn is_disconnected(&self, peer: &PeerAddress) -> bool {
        self.eliminated
            .iter()
            .any(|e| e.peer == *peer && e.outcome == Outcome::Disconnected)
    }

    /// Publishes results if this peer is the one that should.
    ///
    /// The last participant standing publishes. If nobody is standing, the
    /// smallest address that is still connected does.
    fn check_results(&mut self) -> Outbound {
        if self.phase == MatchPhase::ResultsKnown {
            return Ok(Vec::new());
        }
        let alive = self.alive();
        let winner = match alive.as_slice() {
            [survivor] if *survivor == self.local && self.participants.len() > 1 => {
                Some(Elimination {
                    peer: self.local.clone(),
                    outcome: Outcome::Won,
                    score: self.board.score(),
                    attacks: self.attack_tally(),
                })
            }
            [] => {
                let publisher = self
                    .participants
                    .iter()
                    .find(|p| !self.is_disconnected(p));
                if publisher != Some(&self.local) {
                    return Ok(Vec::new());
                }
                None
            }
            _ => return Ok(Vec::new()),
        };

        let results = encode_results(&rank(winner.as_ref(), &self.eliminated))?;
        tracing::info!(local = %self.local, %results, "publishing results");
        self.results = Some(results.clone());
        self.phase = MatchPhase::ResultsKnown;
        Ok(vec![TetrisMessage::GameResults { results }])
    }
}
