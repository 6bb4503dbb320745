//! Converting messages to and from bytes.
//!
//! The mesh does not care how a message is serialized, only that some
//! [`Codec`] can do it. [`JsonCodec`] is the one every peer speaks today:
//! one JSON document per binary WebSocket frame.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ProtocolError, TetrisMessage, WireMessage};

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because a codec is shared by every link task
/// of a mesh.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes one peer message.
    ///
    /// Goes through the flat [`WireMessage`] record first so that an
    /// unknown tag or a missing field comes back as its own error variant
    /// instead of a generic decode failure.
    fn decode_message(&self, data: &[u8]) -> Result<TetrisMessage, ProtocolError> {
        let wire: WireMessage = self.decode(data)?;
        TetrisMessage::try_from(wire)
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature (on by default).
///
/// ```rust
/// use meshtris_protocol::{Codec, JsonCodec, TetrisMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&TetrisMessage::Start { seed: 7 }).unwrap();
/// assert_eq!(bytes, br#"{"type":1,"seed":7}"#);
/// assert_eq!(
///     codec.decode_message(&bytes).unwrap(),
///     TetrisMessage::Start { seed: 7 }
/// );
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::PeerAddress;

    #[test]
    fn test_decode_message_reports_unknown_tag() {
        let err = JsonCodec.decode_message(br#"{"type":42}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(42)));
    }

    #[test]
    fn test_decode_message_reports_missing_field() {
        let err = JsonCodec.decode_message(br#"{"type":1}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingField {
                tag: "START",
                field: "seed"
            }
        ));
    }

    #[test]
    fn test_decode_message_rejects_garbage_bytes() {
        let err = JsonCodec.decode_message(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_bad_sender_address_is_an_address_error() {
        let err = JsonCodec
            .decode_message(br#"{"type":2,"garbage":1,"sender":"nowhere"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[test]
    fn test_encode_then_decode_message() {
        let msg = TetrisMessage::Garbage {
            amount: 3,
            sender: PeerAddress::parse("127.0.0.1:9000").unwrap(),
        };
        let bytes = JsonCodec.encode(&msg).unwrap();
        assert_eq!(JsonCodec.decode_message(&bytes).unwrap(), msg);
    }
}
