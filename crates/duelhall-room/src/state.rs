//! Room lifecycle states and the transition table.
//!
//! ```text
//! Init → WaitingForPlayers → GameReady → GameOngoing → GameOver → RoomOver
//!                               ▲                         │
//!                               └──────── Rematch ────────┘
//!
//! Abandon: any non-terminal state → RoomOver
//! ```

use std::fmt;

use crate::error::TransitionError;

/// The lifecycle state of a room. A room is in exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomState {
    Init,
    /// Seats are being filled and players are connecting.
    WaitingForPlayers,
    /// Fresh game on the board; waiting for the first move.
    GameReady,
    /// Clock running, moves flowing.
    GameOngoing,
    /// Result recorded; the rematch window is open.
    GameOver,
    /// Terminal. The room tears itself down after this.
    RoomOver,
}

/// What drives the room from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomEvent {
    Open,
    PlayersReady,
    FirstMove,
    GameEnded,
    Rematch,
    Close,
    Abandon,
}

impl RoomEvent {
    pub const ALL: [RoomEvent; 7] = [
        Self::Open,
        Self::PlayersReady,
        Self::FirstMove,
        Self::GameEnded,
        Self::Rematch,
        Self::Close,
        Self::Abandon,
    ];
}

use RoomEvent as E;
use RoomState as S;

/// Every declared edge: `(from, event, to)`.
pub const TRANSITIONS: &[(RoomState, RoomEvent, RoomState)] = &[
    (S::Init, E::Open, S::WaitingForPlayers),
    (S::WaitingForPlayers, E::PlayersReady, S::GameReady),
    (S::GameReady, E::FirstMove, S::GameOngoing),
    (S::GameOngoing, E::GameEnded, S::GameOver),
    (S::GameOver, E::Rematch, S::GameReady),
    (S::GameOver, E::Close, S::RoomOver),
    (S::Init, E::Abandon, S::RoomOver),
    (S::WaitingForPlayers, E::Abandon, S::RoomOver),
    (S::GameReady, E::Abandon, S::RoomOver),
    (S::GameOngoing, E::Abandon, S::RoomOver),
    (S::GameOver, E::Abandon, S::RoomOver),
];

impl RoomState {
    pub const ALL: [RoomState; 6] = [
        Self::Init,
        Self::WaitingForPlayers,
        Self::GameReady,
        Self::GameOngoing,
        Self::GameOver,
        Self::RoomOver,
    ];

    /// The state `event` leads to from here.
    ///
    /// # Errors
    /// [`TransitionError`] if no edge is declared; `self` is unchanged.
    pub fn on(self, event: RoomEvent) -> Result<Self, TransitionError> {
        TRANSITIONS
            .iter()
            .find(|(from, ev, _)| *from == self && *ev == event)
            .map(|(_, _, to)| *to)
            .ok_or(TransitionError { from: self, event })
    }

    pub fn is_terminal(self) -> bool {
        self == Self::RoomOver
    }

    /// Whether open seats can still be claimed.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Init | Self::WaitingForPlayers)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
