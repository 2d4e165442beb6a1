//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed frame, missing field, wrong type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but breaks a protocol rule, e.g. a game message
    /// sent before the handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// An outcome was paired with a method that cannot produce it, such as
    /// a draw by resignation.
    #[error("impossible result: {outcome:?} by {method:?}")]
    ImpossibleResult {
        outcome: crate::Outcome,
        method: crate::Method,
    },
}
