//! Codec trait and implementations for turning payloads into frames.
//!
//! The room core hands [`ServerEvent`](crate::ServerEvent)s to a codec and
//! writes the resulting bytes to sockets. Swapping the encoding means
//! swapping the codec, nothing else.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use duelhall_protocol::{Codec, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerEvent::Crowd { count: 2 }).unwrap();
/// assert_eq!(bytes, br#"{"type":"Crowd","count":2}"#);
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
    use crate::{ClientMessage, GameId, RoomId};

    #[test]
    fn test_decode_move_frame() {
        let msg: ClientMessage = JsonCodec
            .decode(br#"{"type":"Move","game_id":7,"mv":"d3"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Move {
                game_id: GameId(7),
                mv: "d3".into()
            }
        );
    }

    #[test]
    fn test_decode_hello_without_token() {
        let msg: ClientMessage = JsonCodec
            .decode(br#"{"type":"Hello","room_id":3,"token":null}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Hello {
                room_id: RoomId(3),
                token: None
            }
        );
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = JsonCodec.decode::<ClientMessage>(b"{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_unknown_type_is_decode_error() {
        let err = JsonCodec
            .decode::<ClientMessage>(br#"{"type":"Teleport"}"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("decode failed"));
    }
}
