//! The local board.
//!
//! Only what the protocol needs: cells, score, the active piece for
//! snapshots, full-row clearing and garbage insertion. Piece geometry and
//! collision belong to the game built on top.

use meshtris_protocol::{ActivePiece, BoardState};
use rand::Rng;

use crate::MatchError;

/// Cell code of an empty cell.
pub const EMPTY: i32 = 0;

/// Cell code of a garbage block.
pub const GARBAGE: i32 = 8;

/// Rows are stored top first: row 0 is the top of the well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<i32>,
    score: i32,
    active: Option<ActivePiece>,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Result<Self, MatchError> {
        if width < 2 || height < 1 {
            return Err(MatchError::InvalidBoard { width, height });
        }
        let (w, h) = (width as usize, height as usize);
        Ok(Self {
            width: w,
            height: h,
            cells: vec![EMPTY; w * h],
            score: 0,
            active: None,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn add_score(&mut self, points: i32) {
        self.score = self.score.saturating_add(points);
    }

    pub fn active_piece(&self) -> Option<&ActivePiece> {
        self.active.as_ref()
    }

    pub fn set_active_piece(&mut self, piece: Option<ActivePiece>) {
        self.active = piece;
    }

    /// Cell at column `x`, row `y`; `None` outside the board.
    pub fn cell(&self, x: usize, y: usize) -> Option<i32> {
        (x < self.width && y < self.height).then(|| self.cells[y * self.width + x])
    }

    /// Sets one cell. Returns `false` outside the board.
    pub fn set_cell(&mut self, x: usize, y: usize, code: i32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[y * self.width + x] = code;
        true
    }

    pub fn row(&self, y: usize) -> &[i32] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    pub fn is_row_empty(&self, y: usize) -> bool {
        self.row(y).iter().all(|c| *c == EMPTY)
    }

    /// Height of the stack: rows from the topmost non-empty row down.
    pub fn stack_height(&self) -> usize {
        (0..self.height)
            .find(|y| !self.is_row_empty(*y))
            .map_or(0, |top| self.height - top)
    }

    /// Removes every full row, shifting the rows above down, and returns
    /// how many were removed.
    pub fn clear_full_rows(&mut self) -> u32 {
        let width = self.width;
        let kept: Vec<i32> = self
            .cells
            .chunks(width)
            .filter(|row| row.iter().any(|c| *c == EMPTY))
            .flatten()
            .copied()
            .collect();
        let cleared = self.cells.len() - kept.len();
        let mut cells = vec![EMPTY; cleared];
        cells.extend(kept);
        self.cells = cells;
        (cleared / width) as u32
    }

    /// Pushes `lines` garbage rows in from the bottom.
    ///
    /// Every row is full except for one empty column picked at random.
    /// Existing rows move up and the top rows fall off. Returns `true` if
    /// any block fell off the top.
    ///
    /// At most `height` rows are inserted; any more would only push
    /// garbage out again, which counts as overflow.
    pub fn insert_garbage<R: Rng>(&mut self, lines: usize, rng: &mut R) -> bool {
        let mut overflow = lines > self.height;
        for _ in 0..lines.min(self.height) {
            overflow |= !self.is_row_empty(0);
            self.cells.drain(..self.width);
            let gap = rng.random_range(0..self.width);
            self.cells
                .extend((0..self.width).map(|x| if x == gap { EMPTY } else { GARBAGE }));
        }
        overflow
    }

    /// Point-in-time view for opponents.
    pub fn snapshot(&self, player_name: &str) -> BoardState {
        BoardState {
            cells: self.cells.clone(),
            width: self.width as i32,
            height: self.height as i32,
            score: self.score,
            player_name: player_name.to_string(),
            active_piece: self.active.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_new_rejects_degenerate_boards() {
        assert!(Board::new(10, 20).is_ok());
        assert!(matches!(
            Board::new(0, 20),
            Err(MatchError::InvalidBoard { width: 0, height: 20 })
        ));
        assert!(Board::new(10, 0).is_err());
    }

    #[test]
    fn test_garbage_rows_have_exactly_one_gap() {
        let mut board = Board::new(10, 20).unwrap();
        let overflow = board.insert_garbage(5, &mut rng());
        assert!(!overflow);
        for y in 15..20 {
            let empty = board.row(y).iter().filter(|c| **c == EMPTY).count();
            assert_eq!(empty, 1, "row {y}");
            assert!(board.row(y).iter().all(|c| *c == EMPTY || *c == GARBAGE));
        }
        assert_eq!(board.stack_height(), 5);
    }

    #[test]
    fn test_garbage_pushes_stack_up() {
        let mut board = Board::new(4, 6).unwrap();
        board.set_cell(2, 5, 3);
        board.insert_garbage(2, &mut rng());
        assert_eq!(board.cell(2, 3), Some(3));
        assert!(board.is_row_empty(0));
    }

    #[test]
    fn test_overflow_when_blocks_leave_the_top() {
        let mut board = Board::new(4, 3).unwrap();
        board.set_cell(0, 1, 1);
        assert!(!board.insert_garbage(1, &mut rng()));
        // The block is now in row 0; one more line pushes it out.
        assert!(board.insert_garbage(1, &mut rng()));
    }

    #[test]
    fn test_oversized_garbage_fills_the_board_and_overflows() {
        let mut board = Board::new(4, 6).unwrap();
        assert!(board.insert_garbage(usize::MAX, &mut rng()));
        assert_eq!(board.stack_height(), 6);

        let mut exact = Board::new(4, 6).unwrap();
        assert!(!exact.insert_garbage(6, &mut rng()));
        assert!(exact.insert_garbage(7, &mut rng()));
    }

    #[test]
    fn test_clear_full_rows_shifts_down() {
        let mut board = Board::new(3, 4).unwrap();
        board.set_cell(1, 1, 5);
        for x in 0..3 {
            board.set_cell(x, 2, 2);
            board.set_cell(x, 3, 2);
        }
        assert_eq!(board.clear_full_rows(), 2);
        assert_eq!(board.cell(1, 3), Some(5));
        assert_eq!(board.stack_height(), 1);
    }

    #[test]
    fn test_snapshot_is_consistent() {
        let mut board = Board::new(10, 20).unwrap();
        board.add_score(300);
        let snap = board.snapshot("bot");
        assert!(snap.validate().is_ok());
        assert_eq!(snap.score, 300);
        assert_eq!(snap.player_name, "bot");
    }
}
