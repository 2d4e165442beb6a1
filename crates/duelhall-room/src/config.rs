//! Room configuration: who sits where, the time control, and the timers
//! that force a room forward when nobody acts.

use std::time::Duration;

use duelhall_clock::ClockConfig;
use duelhall_protocol::{Color, SeatView, UserId};

use crate::RoomError;

/// Deepest search a bot seat may ask the engine for.
pub const MAX_BOT_DEPTH: u8 = 20;

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// Who plays one color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    /// A human player. `None` is an open seat, claimed by the first
    /// authenticated user who joins without already having a seat.
    Human(Option<UserId>),
    /// The engine, searching to `depth`.
    Bot { depth: u8 },
}

impl Seat {
    pub fn open() -> Self {
        Self::Human(None)
    }

    pub fn human(uid: UserId) -> Self {
        Self::Human(Some(uid))
    }

    pub fn bot(depth: u8) -> Self {
        Self::Bot { depth }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Self::Bot { .. })
    }

    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::Human(uid) => *uid,
            Self::Bot { .. } => None,
        }
    }

    pub fn view(&self) -> SeatView {
        match *self {
            Self::Human(None) => SeatView::Open,
            Self::Human(Some(uid)) => SeatView::Human { uid },
            Self::Bot { depth } => SeatView::Bot { depth },
        }
    }
}

// ---------------------------------------------------------------------------
// RoomTimeouts
// ---------------------------------------------------------------------------

/// Deadlines that move a stalled room along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomTimeouts {
    /// How long an empty room waits for anyone to connect.
    pub waiting_for_players: Duration,
    /// How long the side to move has to play the first move.
    pub first_move: Duration,
    /// How long a side may stay disconnected mid-game.
    pub abandonment: Duration,
    /// How long both sides have to agree on a rematch.
    pub rematch: Duration,
    /// How long the room waits for the clock to acknowledge a command.
    pub clock_ack: Duration,
}

impl Default for RoomTimeouts {
    fn default() -> Self {
        Self {
            waiting_for_players: Duration::from_secs(15 * 60),
            first_move: Duration::from_secs(30),
            abandonment: Duration::from_secs(20),
            rematch: Duration::from_secs(30),
            clock_ack: Duration::from_secs(5),
        }
    }
}

impl RoomTimeouts {
    fn validate(&self) -> Result<(), RoomError> {
        let all = [
            ("waiting_for_players", self.waiting_for_players),
            ("first_move", self.first_move),
            ("abandonment", self.abandonment),
            ("rematch", self.rematch),
            ("clock_ack", self.clock_ack),
        ];
        match all.iter().find(|(_, d)| d.is_zero()) {
            Some((name, _)) => Err(RoomError::InvalidConfig(format!(
                "timeout {name} must be non-zero"
            ))),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Everything needed to open a room.
///
/// `S` is the game's setup type (board variant, handicap and so on).
#[derive(Debug, Clone)]
pub struct RoomConfig<S> {
    pub creator: UserId,
    pub white: Seat,
    pub black: Seat,
    pub clock: ClockConfig,
    pub setup: S,
    pub timeouts: RoomTimeouts,
}

impl<S> RoomConfig<S> {
    /// A config with the default clock and timeouts.
    pub fn new(creator: UserId, white: Seat, black: Seat, setup: S) -> Self {
        Self {
            creator,
            white,
            black,
            clock: ClockConfig::default(),
            setup,
            timeouts: RoomTimeouts::default(),
        }
    }

    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeouts(mut self, timeouts: RoomTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn seat(&self, color: Color) -> Seat {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// Rejects configurations that could never produce a game.
    ///
    /// `has_engine` says whether an engine dispatcher is available to
    /// play bot seats.
    pub fn validate(&self, has_engine: bool) -> Result<(), RoomError> {
        let bots = Color::BOTH
            .iter()
            .filter(|c| self.seat(**c).is_bot())
            .count();
        if bots > 1 {
            return Err(RoomError::InvalidConfig(
                "at most one seat may be a bot".into(),
            ));
        }
        for color in Color::BOTH {
            if let Seat::Bot { depth } = self.seat(color) {
                if !(1..=MAX_BOT_DEPTH).contains(&depth) {
                    return Err(RoomError::InvalidConfig(format!(
                        "{color} bot depth {depth} outside 1..={MAX_BOT_DEPTH}"
                    )));
                }
                if !has_engine {
                    return Err(RoomError::InvalidConfig(format!(
                        "{color} is a bot but no engine is configured"
                    )));
                }
            }
        }
        if let (Some(w), Some(b)) = (self.white.user(), self.black.user()) {
            if w == b {
                return Err(RoomError::InvalidConfig(format!(
                    "{w} cannot play both colors"
                )));
            }
        }
        self.clock
            .validate()
            .map_err(|e| RoomError::InvalidConfig(e.to_string()))?;
        self.timeouts.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(white: Seat, black: Seat) -> RoomConfig<()> {
        RoomConfig::new(UserId(1), white, black, ())
    }

    #[test]
    fn test_default_timeouts() {
        let t = RoomTimeouts::default();
        assert_eq!(t.waiting_for_players, Duration::from_secs(900));
        assert_eq!(t.first_move, Duration::from_secs(30));
        assert_eq!(t.abandonment, Duration::from_secs(20));
        assert_eq!(t.rematch, Duration::from_secs(30));
    }

    #[test]
    fn test_human_vs_open_is_valid() {
        assert!(config(Seat::human(UserId(1)), Seat::open()).validate(false).is_ok());
    }

    #[test]
    fn test_two_bots_rejected() {
        let err = config(Seat::bot(3), Seat::bot(3)).validate(true).unwrap_err();
        assert!(matches!(err, RoomError::InvalidConfig(_)));
    }

    #[test]
    fn test_bot_depth_bounds() {
        assert!(config(Seat::bot(0), Seat::open()).validate(true).is_err());
        assert!(config(Seat::bot(21), Seat::open()).validate(true).is_err());
        assert!(config(Seat::bot(20), Seat::open()).validate(true).is_ok());
    }

    #[test]
    fn test_bot_needs_engine() {
        assert!(config(Seat::open(), Seat::bot(5)).validate(false).is_err());
    }

    #[test]
    fn test_same_user_both_sides_rejected() {
        let seat = Seat::human(UserId(9));
        assert!(config(seat, seat).validate(false).is_err());
    }

    #[test]
    fn test_zero_time_rejected() {
        let cfg = config(Seat::open(), Seat::open()).with_clock(ClockConfig::symmetric(
            duelhall_clock::TimeControl::new(Duration::ZERO),
        ));
        assert!(cfg.validate(false).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cfg = config(Seat::open(), Seat::open()).with_timeouts(RoomTimeouts {
            rematch: Duration::ZERO,
            ..RoomTimeouts::default()
        });
        assert!(cfg.validate(false).is_err());
    }

    #[test]
    fn test_seat_view() {
        assert_eq!(Seat::open().view(), SeatView::Open);
        assert_eq!(Seat::bot(4).view(), SeatView::Bot { depth: 4 });
        assert_eq!(
            Seat::human(UserId(2)).view(),
            SeatView::Human { uid: UserId(2) }
        );
    }
}
