//! Error types for the room layer.

use duelhall_clock::ClockError;
use duelhall_protocol::{ProtocolError, RoomId};

use crate::{RoomEvent, RoomState};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room configuration can't be played. Raised before any actor
    /// exists.
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),

    /// Something that must never happen did. Fatal to the room that hit
    /// it, and only to that room.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room's actor has exited.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The engine dispatcher refused a request.
    #[error("engine unavailable: {0}")]
    Engine(String),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// An event was fired in a state that has no edge for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no transition from {from} on {event:?}")]
pub struct TransitionError {
    pub from: RoomState,
    pub event: RoomEvent,
}

impl From<TransitionError> for RoomError {
    fn from(e: TransitionError) -> Self {
        Self::Invariant(e.to_string())
    }
}
