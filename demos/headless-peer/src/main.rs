use std::time::Duration;

use clap::Parser;
use meshtris::prelude::*;
use meshtris::{ActivePiece, EMPTY, LobbyConfig, MatchConfig};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "headless-peer", about = "Plays meshtris matches with a scripted bot")]
struct Cli {
    /// Host part of our own address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long)]
    port: u16,

    /// Every participant, ourselves included. Space or comma separated.
    #[arg(long, num_args = 1.., value_delimiter = ',', required = true)]
    peers: Vec<String>,

    #[arg(long, default_value = "bot")]
    name: String,

    /// Log filter, used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log: String,

    /// Milliseconds between two piece drops.
    #[arg(long, default_value_t = 250)]
    drop_ms: u64,

    /// Give up if the lobby is not ready after this many seconds.
    #[arg(long)]
    ready_timeout: Option<u64>,

    /// Matches to play over the same connections.
    #[arg(long, default_value_t = 1)]
    rounds: u32,
}

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

const LINE_SCORES: [i32; 5] = [0, 100, 300, 500, 800];

/// Drops a piece at a fixed pace. Most pieces fill the lowest open row;
/// S and Z are "misdropped" on top of the stack, so the bot slowly loses
/// unless it keeps clearing.
struct StackBot {
    drop_every: Duration,
    since_drop: Duration,
}

impl StackBot {
    fn new(drop_every: Duration) -> Self {
        Self {
            drop_every,
            since_drop: Duration::ZERO,
        }
    }
}

impl LocalGame for StackBot {
    fn step(&mut self, dt: Duration, engine: &mut MatchEngine) -> Vec<LocalEvent> {
        self.since_drop += dt;
        if self.since_drop < self.drop_every {
            return Vec::new();
        }
        self.since_drop = Duration::ZERO;

        let piece = engine.next_piece();
        let Ok(board) = engine.board_mut() else {
            return Vec::new();
        };
        match drop_piece(board, piece) {
            Some(lines_cleared) => {
                board.add_score(LINE_SCORES[lines_cleared.min(4) as usize]);
                vec![LocalEvent::PieceLocked { lines_cleared }]
            }
            None => vec![LocalEvent::Overflow],
        }
    }
}

/// Places `piece` as four blocks and clears full rows. `None` when there
/// is no room left.
fn drop_piece(board: &mut Board, piece: PieceType) -> Option<u32> {
    let (width, height) = (board.width(), board.height());
    let color = piece.color();

    let mut y = match piece {
        PieceType::S | PieceType::Z => (height - board.stack_height()).checked_sub(1)?,
        _ => (0..height).rev().find(|y| board.row(*y).contains(&EMPTY))?,
    };

    let mut placed = 0;
    loop {
        for x in 0..width {
            if placed < 4 && board.cell(x, y) == Some(EMPTY) {
                board.set_cell(x, y, color);
                placed += 1;
            }
        }
        if placed == 4 {
            break;
        }
        y = y.checked_sub(1)?;
    }

    board.set_active_piece(Some(ActivePiece {
        piece_type: piece,
        x: 0,
        y: y as i32,
        rotation: 0,
        color,
    }));
    Some(board.clear_full_rows())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let mut node = PeerNode::builder()
        .local(&format!("{}:{}", cli.host, cli.port))
        .peers(cli.peers.iter().flat_map(|p| p.split_whitespace()).map(String::from))
        .lobby_config(LobbyConfig {
            ready_timeout: cli.ready_timeout.map(Duration::from_secs),
        })
        .match_config(MatchConfig {
            player_name: cli.name.clone(),
            ..MatchConfig::default()
        })
        .connect()
        .await?;

    let handle = node.handle();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.quit();
            }
        }
    });

    for round in 0..cli.rounds.max(1) {
        if round > 0 {
            node.next_round()?;
        }
        tracing::info!(local = %node.local(), round, "ready");
        handle.ready();

        let start = node.run_lobby().await?;
        let mut bot = StackBot::new(Duration::from_millis(cli.drop_ms));
        let summary = node.play(start, &mut bot).await?;
        report(&summary);
        if summary.quit {
            return Ok(());
        }
    }
    node.shutdown().await;
    Ok(())
}

fn report(summary: &MatchSummary) {
    tracing::info!(
        round = summary.round,
        seed = summary.seed,
        quit = summary.quit,
        stats = ?summary.stats,
        "done"
    );
    for standing in summary.standings.iter().flatten() {
        tracing::info!(
            rank = standing.rank,
            peer = %standing.peer,
            outcome = ?standing.outcome,
            score = standing.score,
            sent = standing.lines_sent,
            received = standing.lines_received,
            "standing"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        Board::new(10, 20).unwrap()
    }

    #[test]
    fn test_pieces_fill_the_lowest_open_row() {
        let mut board = board();
        assert_eq!(drop_piece(&mut board, PieceType::I), Some(0));
        assert_eq!(drop_piece(&mut board, PieceType::O), Some(0));
        assert_eq!(board.stack_height(), 1);
        // Two more cells fill row 19 and spill into row 18.
        assert_eq!(drop_piece(&mut board, PieceType::T), Some(1));
        assert_eq!(board.stack_height(), 1);
    }

    #[test]
    fn test_blocks_take_the_piece_color() {
        let mut board = board();
        drop_piece(&mut board, PieceType::T);
        assert_eq!(board.cell(0, 19), Some(PieceType::T.color()));
    }

    #[test]
    fn test_misdrops_grow_the_stack() {
        let mut board = board();
        drop_piece(&mut board, PieceType::I);
        drop_piece(&mut board, PieceType::S);
        assert_eq!(board.stack_height(), 2);
        drop_piece(&mut board, PieceType::Z);
        assert_eq!(board.stack_height(), 3);
    }

    #[test]
    fn test_full_board_has_no_room() {
        let mut board = Board::new(4, 2).unwrap();
        board.set_cell(0, 0, 1);
        board.set_cell(0, 1, 1);
        assert_eq!(drop_piece(&mut board, PieceType::S), None);
    }

    #[test]
    fn test_cli_accepts_both_peer_separators() {
        let cli = Cli::parse_from([
            "headless-peer",
            "--port",
            "7000",
            "--peers",
            "127.0.0.1:7000,127.0.0.1:7001",
            "127.0.0.1:7002",
        ]);
        assert_eq!(cli.peers.len(), 3);
        assert_eq!(cli.name, "bot");
        assert_eq!(cli.rounds, 1);
    }
}
