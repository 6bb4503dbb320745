//! Error types for the protocol layer.
//!
//! A `ProtocolError` always concerns a single frame: the frame is dropped
//! and the link it arrived on stays open.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes or a shape that does not
    /// match the wire record.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The integer `type` tag does not name a known message.
    #[error("unknown message tag {0}")]
    UnknownTag(i32),

    /// A field the tag requires was absent.
    #[error("{tag} message is missing field `{field}`")]
    MissingField {
        tag: &'static str,
        field: &'static str,
    },

    /// The message decoded but violates a protocol rule
    /// (e.g. a board whose cell count disagrees with its dimensions).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A peer address is not of the form `host:port`.
    #[error("invalid peer address `{0}`")]
    InvalidAddress(String),
}
