//! Time-control parameters.

use std::time::Duration;

use duelhall_protocol::Color;

use crate::ClockError;

/// Time budget for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl {
    /// Total thinking time at the start of the game.
    pub allotted: Duration,
    /// Bonus credited after each completed move.
    pub increment: Duration,
    /// Grace period after each flip before time starts running.
    pub delay: Duration,
}

impl TimeControl {
    /// A plain countdown with no increment and no delay.
    pub fn new(allotted: Duration) -> Self {
        Self {
            allotted,
            increment: Duration::ZERO,
            delay: Duration::ZERO,
        }
    }

    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

/// Time controls for both sides. Usually symmetric, but handicap games give
/// the sides different budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub white: TimeControl,
    pub black: TimeControl,
    /// How long a caller waits for the command loop to acknowledge.
    pub ack_timeout: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::symmetric(TimeControl::default())
    }
}

impl ClockConfig {
    /// Same time control for both sides.
    pub fn symmetric(control: TimeControl) -> Self {
        Self {
            white: control,
            black: control,
            ack_timeout: Duration::from_secs(5),
        }
    }

    /// The time control for `color`.
    pub fn side(&self, color: Color) -> &TimeControl {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// The same config with the two sides' controls exchanged. Used when a
    /// rematch swaps colors.
    pub fn swapped(self) -> Self {
        Self {
            white: self.black,
            black: self.white,
            ack_timeout: self.ack_timeout,
        }
    }

    /// Rejects configs a game can't be played with.
    pub fn validate(&self) -> Result<(), ClockError> {
        for color in Color::BOTH {
            if self.side(color).allotted.is_zero() {
                return Err(ClockError::InvalidConfig(format!(
                    "{color} has no allotted time"
                )));
            }
        }
        if self.ack_timeout.is_zero() {
            return Err(ClockError::InvalidConfig(
                "acknowledgement timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_uses_same_control() {
        let tc = TimeControl::new(Duration::from_secs(60)).with_increment(Duration::from_secs(2));
        let cfg = ClockConfig::symmetric(tc);
        assert_eq!(cfg.side(Color::White), cfg.side(Color::Black));
        assert_eq!(cfg.white.increment, Duration::from_secs(2));
    }

    #[test]
    fn test_swapped_exchanges_sides() {
        let cfg = ClockConfig {
            white: TimeControl::new(Duration::from_secs(60)),
            black: TimeControl::new(Duration::from_secs(30)),
            ack_timeout: Duration::from_secs(5),
        };
        let swapped = cfg.swapped();
        assert_eq!(swapped.white.allotted, Duration::from_secs(30));
        assert_eq!(swapped.black.allotted, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_allotted_is_invalid() {
        let cfg = ClockConfig::symmetric(TimeControl::new(Duration::ZERO));
        assert!(matches!(cfg.validate(), Err(ClockError::InvalidConfig(_))));
        assert!(ClockConfig::default().validate().is_ok());
    }
}
