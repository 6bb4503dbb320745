//! One peer of a match, from listening socket to final results.

use meshtris_lobby::{Lobby, LobbyConfig, LobbyError, LobbyPhase, MatchStart};
use meshtris_match::{MatchConfig, MatchEngine};
use meshtris_mesh::{Mesh, MeshConfig};
use meshtris_protocol::PeerAddress;
use meshtris_tick::{TickClock, TickConfig};
use meshtris_transport::WebSocketListener;
use tokio::sync::mpsc;

use crate::lobby::drive_lobby;
use crate::session::{MatchSummary, drive_match};
use crate::{LocalGame, MeshtrisError, PeerConfig};

/// Local player input that is not gameplay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// The local player is ready to start.
    Ready,
    /// The local player leaves. Aborts the lobby, or forfeits the match.
    Quit,
}

/// Sends [`NodeCommand`]s to a running [`PeerNode`].
///
/// Cheap to clone. Sending never blocks; it fails only once the node is
/// gone, which is ignored.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    sender: mpsc::UnboundedSender<NodeCommand>,
}

impl NodeHandle {
    pub fn ready(&self) {
        let _ = self.sender.send(NodeCommand::Ready);
    }

    pub fn quit(&self) {
        let _ = self.sender.send(NodeCommand::Quit);
    }
}

/// Builder for [`PeerNode`].
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), meshtris::MeshtrisError> {
/// let node = meshtris::PeerNode::builder()
///     .local("127.0.0.1:7000")
///     .peers(["127.0.0.1:7000", "127.0.0.1:7001"])
///     .connect()
///     .await?;
/// node.handle().ready();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct PeerNodeBuilder {
    config: PeerConfig,
    listener: Option<WebSocketListener>,
}

impl PeerNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a complete configuration.
    pub fn config(mut self, config: PeerConfig) -> Self {
        self.config = config;
        self
    }

    /// Our own `host:port`.
    pub fn local(mut self, addr: &str) -> Self {
        self.config.local = addr.to_string();
        self
    }

    pub fn peer(mut self, addr: &str) -> Self {
        self.config.peers.push(addr.to_string());
        self
    }

    pub fn peers<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.peers.extend(addrs.into_iter().map(Into::into));
        self
    }

    pub fn mesh_config(mut self, config: MeshConfig) -> Self {
        self.config.mesh = config;
        self
    }

    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.config.lobby = config;
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.config.game = config;
        self
    }

    pub fn tick_config(mut self, config: TickConfig) -> Self {
        self.config.tick = config;
        self
    }

    /// Uses an already bound listener instead of binding `local`.
    pub fn listener(mut self, listener: WebSocketListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Parses the addresses and establishes the mesh.
    ///
    /// # Errors
    /// Fails on a malformed address or if the listener cannot be bound.
    /// Unreachable peers are not an error; the lobby sees them as lost.
    pub async fn connect(self) -> Result<PeerNode, MeshtrisError> {
        let Self { config, listener } = self;
        if config.local.is_empty() {
            return Err(MeshtrisError::Config("local address is not set".into()));
        }
        let local = PeerAddress::parse(&config.local)?;
        let peers = config
            .peers
            .iter()
            .map(|p| PeerAddress::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mesh = match listener {
            Some(listener) => {
                Mesh::establish_on(listener, config.mesh.clone(), local.clone(), &peers).await
            }
            None => Mesh::establish(config.mesh.clone(), local.clone(), &peers).await?,
        };
        let lobby = Lobby::new(local, &peers);
        let (sender, commands) = mpsc::unbounded_channel();

        Ok(PeerNode {
            config,
            peers,
            mesh,
            lobby,
            commands,
            handle: NodeHandle { sender },
        })
    }
}

/// One participant: its mesh, its lobby, and later its matches.
///
/// The mesh outlives a match. After [`PeerNode::play`] returns with
/// results, [`PeerNode::next_round`] opens a new lobby over the same
/// links.
#[derive(Debug)]
pub struct PeerNode {
    config: PeerConfig,
    /// The configured addresses, parsed.
    peers: Vec<PeerAddress>,
    mesh: Mesh,
    lobby: Lobby,
    commands: mpsc::UnboundedReceiver<NodeCommand>,
    handle: NodeHandle,
}

impl PeerNode {
    pub fn builder() -> PeerNodeBuilder {
        PeerNodeBuilder::new()
    }

    /// A handle for sending Ready and Quit.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    pub fn local(&self) -> &PeerAddress {
        self.mesh.local()
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    /// Runs the lobby until the seed is agreed.
    ///
    /// On failure the mesh is closed.
    pub async fn run_lobby(&mut self) -> Result<MatchStart, MeshtrisError> {
        let result = drive_lobby(
            &mut self.mesh,
            &mut self.lobby,
            &mut self.commands,
            self.config.lobby.ready_timeout,
        )
        .await;
        if result.is_err() {
            self.close().await;
        }
        result
    }

    /// Plays the match `start` describes with `game`.
    ///
    /// The mesh stays open once results are known, ready for
    /// [`PeerNode::next_round`]. It is closed if the local player quit or
    /// the match failed.
    pub async fn play<G: LocalGame>(
        &mut self,
        start: MatchStart,
        game: &mut G,
    ) -> Result<MatchSummary, MeshtrisError> {
        let mut engine = MatchEngine::new(
            self.config.game.clone(),
            self.local().clone(),
            start.seed,
            start.participants.iter().cloned(),
        )?;
        let mut clock = TickClock::new(self.config.tick.clone());

        let result = drive_match(
            &mut self.mesh,
            &mut engine,
            &mut clock,
            game,
            &mut self.commands,
            start,
        )
        .await;
        if !matches!(&result, Ok(summary) if !summary.quit) {
            self.close().await;
        }
        result
    }

    /// Opens the lobby for another match over the links still open.
    ///
    /// Ready flags start over; peers send Ready again. Peers whose link
    /// broke are no longer waited for.
    ///
    /// # Errors
    /// Fails unless the last match ran to its end without the local
    /// player quitting, or if no remote peer is left.
    pub fn next_round(&mut self) -> Result<(), MeshtrisError> {
        let phase = self.lobby.phase();
        if phase != LobbyPhase::InMatch {
            return Err(LobbyError::InvalidTransition {
                phase,
                op: "start another round",
            }
            .into());
        }
        let live = self.mesh.live_peers();
        let round = self.lobby.round() + 1;
        self.lobby = Lobby::rematch(self.local().clone(), &self.peers, &live, round)?;
        Ok(())
    }

    /// Lobby then match, once. The mesh is closed afterwards.
    pub async fn run<G: LocalGame>(mut self, game: &mut G) -> Result<MatchSummary, MeshtrisError> {
        let start = self.run_lobby().await?;
        let summary = self.play(start, game).await;
        self.close().await;
        summary
    }

    /// Closes every link without playing.
    pub async fn shutdown(mut self) {
        self.close().await;
    }

    async fn close(&mut self) {
        self.lobby.abort();
        self.mesh.close().await;
    }
}
