//! Multi-peer match scenarios, with messages routed by hand between
//! engines the way the mesh would deliver them.

use std::collections::VecDeque;

use meshtris_match::{MatchConfig, MatchEngine, MatchPhase, Outcome, attack, parse_results};
use meshtris_protocol::{PeerAddress, TetrisMessage};
use proptest::prelude::*;

fn addr(s: &str) -> PeerAddress {
    PeerAddress::parse(s).unwrap()
}

/// A small in-memory mesh: every broadcast is queued for every other
/// engine, and delivered in FIFO order per receiver.
struct Table {
    engines: Vec<MatchEngine>,
    queues: Vec<VecDeque<(PeerAddress, TetrisMessage)>>,
    results_sent: Vec<PeerAddress>,
}

impl Table {
    fn new(names: &[&str]) -> Self {
        let peers: Vec<PeerAddress> = names.iter().map(|n| addr(n)).collect();
        let engines = peers
            .iter()
            .map(|p| MatchEngine::new(MatchConfig::default(), p.clone(), 77, peers.clone()).unwrap())
            .collect();
        Self {
            engines,
            queues: vec![VecDeque::new(); names.len()],
            results_sent: Vec::new(),
        }
    }

    fn broadcast(&mut self, from: usize, out: Vec<TetrisMessage>) {
        let sender = self.engines[from].local().clone();
        for msg in out {
            if matches!(msg, TetrisMessage::GameResults { .. }) {
                self.results_sent.push(sender.clone());
            }
            for (i, queue) in self.queues.iter_mut().enumerate() {
                if i != from {
                    queue.push_back((sender.clone(), msg.clone()));
                }
            }
        }
    }

    /// Delivers everything queued, including what the deliveries produce.
    fn settle(&mut self) {
        loop {
            let mut progressed = false;
            for i in 0..self.engines.len() {
                while let Some((from, msg)) = self.queues[i].pop_front() {
                    progressed = true;
                    let out = self.engines[i].on_message(&from, msg).unwrap();
                    self.broadcast(i, out);
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn overflow(&mut self, who: usize) {
        let out = self.engines[who].on_board_overflow().unwrap();
        self.broadcast(who, out);
    }
}

#[test]
fn test_tetris_on_streak_two_reaches_both_opponents() {
    let mut table = Table::new(&["a:1", "b:2", "c:3"]);

    // Three singles build the streak to 2 before the Tetris.
    for _ in 0..3 {
        let out = table.engines[0].on_lines_cleared(1).unwrap();
        table.broadcast(0, out);
    }
    let out = table.engines[0].on_lines_cleared(4).unwrap();
    assert_eq!(
        out,
        vec![TetrisMessage::Garbage {
            amount: attack(4, 2) as i32,
            sender: addr("a:1"),
        }]
    );
    table.broadcast(0, out);

    // Pretend the mesh also echoed it back to A.
    let echo = TetrisMessage::Garbage {
        amount: 5,
        sender: addr("a:1"),
    };
    table.engines[0].on_message(&addr("b:2"), echo).unwrap();

    table.settle();
    let pending = |i: usize, t: &Table| t.engines[i].pending_garbage().collect::<Vec<_>>();
    assert!(pending(0, &table).is_empty(), "A never applies its own garbage");
    // The singles earned nothing; only the Tetris arrives.
    assert_eq!(pending(1, &table), vec![5]);
    assert_eq!(pending(2, &table), vec![5]);

    let applied = table.engines[1].on_piece_locked().unwrap();
    assert_eq!(applied.rows, 5);
    assert!(pending(1, &table).is_empty());
}

#[test]
fn test_last_survivor_publishes_results_exactly_once() {
    let mut table = Table::new(&["a:1", "b:2", "c:3"]);

    table.engines[1].board_mut().unwrap().add_score(300);
    table.overflow(1);
    table.settle();
    assert!(table.results_sent.is_empty(), "two peers are still playing");
    for i in [0, 2] {
        assert!(table.engines[i].lost().contains(&addr("b:2")));
    }

    table.overflow(2);
    table.settle();

    assert_eq!(table.results_sent, vec![addr("a:1")]);
    for engine in &table.engines {
        assert_eq!(engine.phase(), MatchPhase::ResultsKnown);
    }

    let standings = parse_results(table.engines[1].results().unwrap()).unwrap();
    let order: Vec<(&str, Outcome, i32)> = standings
        .iter()
        .map(|s| (s.peer.as_str(), s.outcome, s.score))
        .collect();
    assert_eq!(
        order,
        vec![
            ("a:1", Outcome::Won, 0),
            ("c:3", Outcome::Lost, 0),
            ("b:2", Outcome::Lost, 300),
        ]
    );
}

#[test]
fn test_disconnect_and_loss_together_still_end_the_match() {
    let mut table = Table::new(&["a:1", "b:2", "c:3"]);

    // C drops off the mesh entirely; A and B see it as lost.
    for i in [0, 1] {
        let out = table.engines[i].on_peer_lost(&addr("c:3")).unwrap();
        table.broadcast(i, out);
    }
    table.queues[2].clear();

    table.overflow(0);
    // C is gone, so nothing reaches it.
    table.queues[2].clear();
    table.settle();
    table.queues[2].clear();

    assert_eq!(table.results_sent, vec![addr("b:2")]);
    assert_eq!(table.engines[0].phase(), MatchPhase::ResultsKnown);
}

proptest! {
    #[test]
    fn prop_own_garbage_never_changes_the_queue(amount in any::<i32>()) {
        let mut engine =
            MatchEngine::new(MatchConfig::default(), addr("a:1"), 0, [addr("b:2")]).unwrap();
        engine.on_garbage_received(amount, &addr("a:1"));
        prop_assert_eq!(engine.pending_garbage().count(), 0);
    }

    #[test]
    fn prop_draining_inserts_every_queued_row(amounts in prop::collection::vec(1i32..4, 0..5)) {
        let mut engine =
            MatchEngine::new(MatchConfig::default(), addr("a:1"), 0, [addr("b:2")]).unwrap();
        for amount in &amounts {
            engine.on_garbage_received(*amount, &addr("b:2"));
        }
        let applied = engine.on_piece_locked().unwrap();
        let total: i32 = amounts.iter().sum();
        prop_assert_eq!(applied.rows as i32, total);
        prop_assert!(!applied.overflow);

        let board = engine.board();
        for y in board.height() - total as usize..board.height() {
            let gaps = board.row(y).iter().filter(|c| **c == meshtris_match::EMPTY).count();
            prop_assert_eq!(gaps, 1);
        }
    }
}
