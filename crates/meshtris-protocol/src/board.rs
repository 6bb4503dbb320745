//! Board snapshots exchanged for opponent display.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The seven tetromino shapes.
///
/// Serialized as the single-letter name (`"I"`, `"O"`, …), which is the
/// `piece_type` string of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceType {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceType {
    /// All piece types in canonical order. Seeded piece sequences index
    /// into this array, so its order is part of the protocol.
    pub const ALL: [PieceType; 7] = [
        PieceType::I,
        PieceType::O,
        PieceType::T,
        PieceType::S,
        PieceType::Z,
        PieceType::J,
        PieceType::L,
    ];

    /// The cell code a locked block of this piece leaves on the board.
    pub fn color(self) -> i32 {
        match self {
            Self::I => 1,
            Self::O => 2,
            Self::T => 3,
            Self::S => 4,
            Self::Z => 5,
            Self::J => 6,
            Self::L => 7,
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I => "I",
            Self::O => "O",
            Self::T => "T",
            Self::S => "S",
            Self::Z => "Z",
            Self::J => "J",
            Self::L => "L",
        };
        f.write_str(name)
    }
}

/// The falling piece at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePiece {
    pub piece_type: PieceType,
    pub x: i32,
    pub y: i32,
    /// Quarter turns clockwise, `0..=3`.
    pub rotation: i32,
    pub color: i32,
}

/// A point-in-time view of one peer's board.
///
/// Display only: each peer is authoritative over its own board, and a
/// snapshot never feeds back into gameplay on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    /// Row-major cell codes, `width * height` entries, row 0 at the top.
    pub cells: Vec<i32>,
    pub width: i32,
    pub height: i32,
    pub score: i32,
    #[serde(default)]
    pub player_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_piece: Option<ActivePiece>,
}

impl BoardState {
    /// Checks the structural rules a decoded snapshot must satisfy.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ProtocolError::InvalidMessage(format!(
                "board dimensions {}x{} must be positive",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize;
        if self.cells.len() != expected {
            return Err(ProtocolError::InvalidMessage(format!(
                "board has {} cells, expected {}",
                self.cells.len(),
                expected
            )));
        }
        if let Some(piece) = &self.active_piece {
            if !(0..4).contains(&piece.rotation) {
                return Err(ProtocolError::InvalidMessage(format!(
                    "rotation {} out of range",
                    piece.rotation
                )));
            }
        }
        Ok(())
    }

    /// Splits the flat cell array back into rows.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.cells.chunks(self.width.max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(width: i32, height: i32) -> BoardState {
        BoardState {
            cells: vec![0; (width * height) as usize],
            width,
            height,
            score: 0,
            player_name: "p".into(),
            active_piece: None,
        }
    }

    #[test]
    fn test_piece_type_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&PieceType::T).unwrap(), "\"T\"");
        let p: PieceType = serde_json::from_str("\"L\"").unwrap();
        assert_eq!(p, PieceType::L);
        assert!(serde_json::from_str::<PieceType>("\"Q\"").is_err());
    }

    #[test]
    fn test_piece_colors_are_distinct_and_nonzero() {
        let mut colors: Vec<i32> = PieceType::ALL.iter().map(|p| p.color()).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 7);
        assert!(colors.iter().all(|c| *c > 0));
    }

    #[test]
    fn test_validate_accepts_consistent_board() {
        assert!(board(10, 20).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_cell_count_mismatch() {
        let mut b = board(10, 20);
        b.cells.pop();
        assert!(matches!(b.validate(), Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_validate_rejects_bad_rotation() {
        let mut b = board(4, 4);
        b.active_piece = Some(ActivePiece {
            piece_type: PieceType::I,
            x: 0,
            y: 0,
            rotation: 4,
            color: 1,
        });
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_rows_unflattens_row_major() {
        let mut b = board(3, 2);
        b.cells = vec![1, 2, 3, 4, 5, 6];
        let rows: Vec<&[i32]> = b.rows().collect();
        assert_eq!(rows, vec![&[1, 2, 3][..], &[4, 5, 6][..]]);
    }
}
