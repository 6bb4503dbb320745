//! The peer-to-peer message vocabulary.
//!
//! On the wire every message is one flat record: an integer `type` tag
//! plus a set of optional fields, only some of which matter for a given
//! tag. In Rust that record is [`TetrisMessage`], a closed enum whose
//! variants carry exactly the fields their tag uses, so a `match` over it
//! is checked for missing cases at compile time.
//!
//! The flat record ([`WireMessage`]) only exists at the serde boundary:
//! `#[serde(try_from = "WireMessage", into = "WireMessage")]` converts on
//! every encode and decode, and a record with an unknown tag or a missing
//! tag-relevant field fails to decode with a [`ProtocolError`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BoardState, PeerAddress, ProtocolError};

/// Integer tags of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageType {
    Ready = 0,
    Start = 1,
    Garbage = 2,
    Lose = 3,
    GameResults = 4,
    GameState = 5,
}

impl MessageType {
    /// Upper-case tag name, as used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Start => "START",
            Self::Garbage => "GARBAGE",
            Self::Lose => "LOSE",
            Self::GameResults => "GAME_RESULTS",
            Self::GameState => "GAME_STATE",
        }
    }
}

impl TryFrom<i32> for MessageType {
    type Error = ProtocolError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::Ready,
            1 => Self::Start,
            2 => Self::Garbage,
            3 => Self::Lose,
            4 => Self::GameResults,
            5 => Self::GameState,
            other => return Err(ProtocolError::UnknownTag(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A message exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub enum TetrisMessage {
    /// The sender is ready to start.
    Ready,

    /// The agreed RNG seed for this match.
    Start { seed: i32 },

    /// Attack lines. `sender` lets every receiver reject its own garbage.
    Garbage { amount: i32, sender: PeerAddress },

    /// The sender's board overflowed; `score` is its final score.
    /// `attacks` travels in `extra` and is absent when the sender did not
    /// report it.
    Lose {
        score: i32,
        attacks: Option<AttackTally>,
    },

    /// Serialized final ranking.
    GameResults { results: String },

    /// Board snapshot for opponent display.
    GameState { board_state: BoardState },
}

impl TetrisMessage {
    /// The wire tag of this message.
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Ready => MessageType::Ready,
            Self::Start { .. } => MessageType::Start,
            Self::Garbage { .. } => MessageType::Garbage,
            Self::Lose { .. } => MessageType::Lose,
            Self::GameResults { .. } => MessageType::GameResults,
            Self::GameState { .. } => MessageType::GameState,
        }
    }
}

/// Garbage lines one player sent and received over a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttackTally {
    pub sent: u32,
    pub received: u32,
}

impl AttackTally {
    /// `"sent:received"` as UTF-8, the shape Lose carries in `extra`.
    pub fn to_extra(self) -> Vec<u8> {
        format!("{}:{}", self.sent, self.received).into_bytes()
    }

    /// Reads `extra` back. Anything unreadable is `None`; the field is
    /// informational and never fails a decode.
    pub fn from_extra(extra: &[u8]) -> Option<Self> {
        let (sent, received) = std::str::from_utf8(extra).ok()?.split_once(':')?;
        Some(Self {
            sent: sent.trim().parse().ok()?,
            received: received.trim().parse().ok()?,
        })
    }
}

/// The flat wire record. Public so other implementations can be checked
/// against it; Rust code should use [`TetrisMessage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garbage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    /// Free-form bytes. Lose uses it for [`AttackTally`]; every other
    /// tag ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_state: Option<BoardState>,
}

fn required<T>(
    value: Option<T>,
    tag: MessageType,
    field: &'static str,
) -> Result<T, ProtocolError> {
    value.ok_or(ProtocolError::MissingField {
        tag: tag.name(),
        field,
    })
}

impl TryFrom<WireMessage> for TetrisMessage {
    type Error = ProtocolError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let tag = MessageType::try_from(wire.kind)?;
        Ok(match tag {
            MessageType::Ready => Self::Ready,
            MessageType::Start => Self::Start {
                seed: required(wire.seed, tag, "seed")?,
            },
            MessageType::Garbage => Self::Garbage {
                amount: required(wire.garbage, tag, "garbage")?,
                sender: PeerAddress::parse(&required(wire.sender, tag, "sender")?)?,
            },
            MessageType::Lose => Self::Lose {
                score: wire.score.unwrap_or_default(),
                attacks: wire.extra.as_deref().and_then(AttackTally::from_extra),
            },
            MessageType::GameResults => Self::GameResults {
                results: required(wire.results, tag, "results")?,
            },
            MessageType::GameState => {
                let board_state = required(wire.board_state, tag, "board_state")?;
                board_state.validate()?;
                Self::GameState { board_state }
            }
        })
    }
}

impl From<TetrisMessage> for WireMessage {
    fn from(msg: TetrisMessage) -> Self {
        let mut wire = WireMessage {
            kind: msg.kind() as i32,
            ..WireMessage::default()
        };
        match msg {
            TetrisMessage::Ready => {}
            TetrisMessage::Start { seed } => wire.seed = Some(seed),
            TetrisMessage::Garbage { amount, sender } => {
                wire.garbage = Some(amount);
                wire.sender = Some(sender.into());
            }
            TetrisMessage::Lose { score, attacks } => {
                wire.score = Some(score);
                wire.extra = attacks.map(AttackTally::to_extra);
            }
            TetrisMessage::GameResults { results } => wire.results = Some(results),
            TetrisMessage::GameState { board_state } => {
                wire.board_state = Some(board_state);
            }
        }
        wire
    }
}
