//! How a game ended.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Color, ProtocolError};

/// Who won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

impl Outcome {
    /// The outcome where `color` wins.
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => Self::WhiteWins,
            Color::Black => Self::BlackWins,
        }
    }

    /// The winning side, or `None` for a draw.
    pub fn winner(self) -> Option<Color> {
        match self {
            Self::WhiteWins => Some(Color::White),
            Self::BlackWins => Some(Color::Black),
            Self::Draw => None,
        }
    }
}

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Decided by the game's own rules (no moves left, board full, ...).
    Rules,
    /// A side gave up.
    Resignation,
    /// A side's clock ran out.
    Timeout,
    /// One or both sides stopped showing up.
    Abandonment,
}

impl Method {
    /// Whether this method can end a game in a draw.
    pub fn allows_draw(self) -> bool {
        matches!(self, Self::Rules | Self::Abandonment)
    }
}

/// A finished game's outcome, the method that produced it and an optional
/// rules-specific detail ("no legal moves").
///
/// Construct with [`GameResult::new`]; impossible pairings are refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    outcome: Outcome,
    method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl GameResult {
    /// Pairs an outcome with a method.
    ///
    /// # Errors
    /// [`ProtocolError::ImpossibleResult`] for draws by resignation or
    /// timeout.
    pub fn new(outcome: Outcome, method: Method) -> Result<Self, ProtocolError> {
        if outcome == Outcome::Draw && !method.allows_draw() {
            return Err(ProtocolError::ImpossibleResult { outcome, method });
        }
        Ok(Self {
            outcome,
            method,
            detail: None,
        })
    }

    /// `color` resigned; the other side wins.
    pub fn resignation(color: Color) -> Self {
        Self {
            outcome: Outcome::win_for(color.opposite()),
            method: Method::Resignation,
            detail: None,
        }
    }

    /// `color` ran out of time; the other side wins.
    pub fn timeout(color: Color) -> Self {
        Self {
            outcome: Outcome::win_for(color.opposite()),
            method: Method::Timeout,
            detail: None,
        }
    }

    /// Attaches a human-readable detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Sentence shown to players, e.g. "black wins on time".
    pub fn reason(&self) -> String {
        let head = match self.outcome.winner() {
            Some(color) => format!("{color} wins"),
            None => "draw".to_string(),
        };
        let how = match (self.method, self.outcome.winner()) {
            (Method::Rules, _) => self.detail.clone().unwrap_or_else(|| "by the rules".into()),
            (Method::Resignation, Some(w)) => format!("{} resigned", w.opposite()),
            (Method::Timeout, Some(w)) => format!("{} ran out of time", w.opposite()),
            (Method::Abandonment, Some(w)) => format!("{} abandoned the game", w.opposite()),
            (Method::Abandonment, None) => "both players abandoned the game".into(),
            // Rejected by `new`.
            (Method::Resignation | Method::Timeout, None) => "invalid".into(),
        };
        format!("{head}: {how}")
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_by_resignation_is_impossible() {
        let err = GameResult::new(Outcome::Draw, Method::Resignation).unwrap_err();
        assert!(matches!(err, ProtocolError::ImpossibleResult { .. }));
        assert!(GameResult::new(Outcome::Draw, Method::Timeout).is_err());
    }

    #[test]
    fn test_draw_by_abandonment_and_rules_allowed() {
        assert!(GameResult::new(Outcome::Draw, Method::Abandonment).is_ok());
        assert!(GameResult::new(Outcome::Draw, Method::Rules).is_ok());
    }

    #[test]
    fn test_timeout_awards_the_other_side() {
        let r = GameResult::timeout(Color::White);
        assert_eq!(r.outcome(), Outcome::BlackWins);
        assert_eq!(r.method(), Method::Timeout);
        assert_eq!(r.reason(), "black wins: white ran out of time");
    }

    #[test]
    fn test_reason_uses_rules_detail() {
        let r = GameResult::new(Outcome::WhiteWins, Method::Rules)
            .unwrap()
            .with_detail("no legal moves for black");
        assert_eq!(r.reason(), "white wins: no legal moves for black");
    }

    #[test]
    fn test_abandonment_draw_reason() {
        let r = GameResult::new(Outcome::Draw, Method::Abandonment).unwrap();
        assert_eq!(r.reason(), "draw: both players abandoned the game");
    }
}
