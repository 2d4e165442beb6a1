//! Identity types and the payloads that travel to and from clients.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an account (human player or spectator).
///
/// Serialized as the bare number (`#[serde(transparent)]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a room (one match, possibly several games).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifies one game inside a room. A rematch gets a fresh id, so replies
/// addressed to the previous game can be told apart and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// One of the two sides of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Both colors, white first.
    pub const BOTH: [Color; 2] = [Color::White, Color::Black];

    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Stable array index (white = 0, black = 1) for per-side tables.
    pub fn index(self) -> usize {
        match self {
            Self::White => 0,
            Self::Black => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot pieces
// ---------------------------------------------------------------------------

/// Per-side score as reported by the game rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub white: u32,
    pub black: u32,
}

/// Remaining clock time per side, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockReadout {
    pub white_ms: u64,
    pub black_ms: u64,
    /// Whether the side to move is currently losing time.
    pub running: bool,
}

/// Public view of who sits on one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SeatView {
    /// A human seat nobody has claimed yet.
    Open,
    Human { uid: UserId },
    Bot { depth: u8 },
}

/// Everything a client needs to draw the board.
///
/// All fields are read from the same game instance and the same clock
/// reading, so they always describe one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub room_id: RoomId,
    pub game_id: GameId,
    /// Board in OFEN notation.
    pub position: String,
    pub legal_moves: Vec<String>,
    pub to_move: Color,
    pub clock: ClockReadout,
    pub check: bool,
    pub score: Score,
    pub white: SeatView,
    pub black: SeatView,
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything a room pushes to its sockets.
///
/// Internally tagged: `{ "type": "Crowd", "count": 3 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Authoritative board state.
    Snapshot(Snapshot),

    /// Number of sockets currently watching the room.
    Crowd { count: usize },

    /// The current game finished.
    GameOver {
        outcome: crate::Outcome,
        reason: String,
        score: Score,
    },

    /// One side asked for a rematch.
    RematchRequested { color: Color },

    /// Both sides agreed; a fresh game starts under the same room id with
    /// colors swapped.
    Rematch { game_id: GameId },

    /// Clients should leave this room (it was cancelled).
    Redirect { room_id: RoomId },

    /// The room closed without a game result.
    RoomOver { reason: String },
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// First frame on a socket: which room, and who am I.
    Hello {
        room_id: RoomId,
        token: Option<String>,
    },

    /// Play `mv` (move notation) in game `game_id`.
    Move { game_id: GameId, mv: String },

    Resign,

    Rematch,

    /// Ask for the current snapshot.
    Resync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opposite_and_index() {
        assert_eq!(Color::White.opposite(), Color::Black);
        assert_eq!(Color::Black.opposite(), Color::White);
        assert_eq!(Color::White.index(), 0);
        assert_eq!(Color::Black.index(), 1);
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(UserId(4).to_string(), "U-4");
        assert_eq!(RoomId(9).to_string(), "R-9");
        assert_eq!(GameId(2).to_string(), "G-2");
        assert_eq!(Color::Black.to_string(), "black");
    }

    #[test]
    fn test_server_event_is_internally_tagged() {
        let json = serde_json::to_value(ServerEvent::RematchRequested {
            color: Color::White,
        })
        .unwrap();
        assert_eq!(json["type"], "RematchRequested");
        assert_eq!(json["color"], "white");
    }

    #[test]
    fn test_snapshot_event_flattens_fields() {
        let snap = Snapshot {
            room_id: RoomId(1),
            game_id: GameId(1),
            position: "8/8 w".into(),
            legal_moves: vec!["a1".into()],
            to_move: Color::White,
            clock: ClockReadout::default(),
            check: false,
            score: Score::default(),
            white: SeatView::Human { uid: UserId(5) },
            black: SeatView::Bot { depth: 3 },
            finished: false,
        };
        let json = serde_json::to_value(ServerEvent::Snapshot(snap)).unwrap();
        assert_eq!(json["type"], "Snapshot");
        assert_eq!(json["position"], "8/8 w");
        assert_eq!(json["white"]["kind"], "Human");
        assert_eq!(json["black"]["depth"], 3);
    }
}
