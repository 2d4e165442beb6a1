//! Unified error type for Duelhall.

use duelhall_clock::ClockError;
use duelhall_directory::DirectoryError;
use duelhall_protocol::{ProtocolError, RoomId};
use duelhall_room::RoomError;
use duelhall_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` variants let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelhallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// The [`Authenticator`](crate::Authenticator) rejected a token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A cancel request carried the wrong token.
    #[error("cancel token rejected for room {0}")]
    BadCancelToken(RoomId),

    /// The client didn't open with a valid `Hello`.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: DuelhallError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, DuelhallError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DuelhallError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, DuelhallError::Protocol(_)));
    }

    #[test]
    fn test_from_clock_error() {
        let err: DuelhallError = ClockError::Closed.into();
        assert!(matches!(err, DuelhallError::Clock(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: DuelhallError = RoomError::NotFound(RoomId(1)).into();
        assert!(matches!(err, DuelhallError::Room(_)));
        assert!(err.to_string().contains("R-1"));
    }

    #[test]
    fn test_bad_cancel_token_names_room() {
        let err = DuelhallError::BadCancelToken(RoomId(9));
        assert_eq!(err.to_string(), "cancel token rejected for room R-9");
    }
}
