//! Error types for the clock.

use std::time::Duration;

/// Errors returned by [`Clock`](crate::Clock) operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The clock was stopped, reset, or never started; its command loop is
    /// not there to accept the request.
    #[error("clock is closed")]
    Closed,

    /// The command loop did not acknowledge within the guard interval.
    #[error("clock did not acknowledge within {0:?}")]
    Unresponsive(Duration),

    /// The time control can't be used (zero allotted time).
    #[error("invalid time control: {0}")]
    InvalidConfig(String),
}
