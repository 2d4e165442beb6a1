//! The `Game` trait: the rules a room referees.
//!
//! The room never interprets positions or moves itself. It asks the game
//! whose turn it is, which encoded moves are legal, and whether the game
//! has ended, and treats every answer as opaque text.

use duelhall_protocol::{Color, GameResult, Score};

/// One game instance. A room owns exactly one at a time and replaces it
/// wholesale on rematch.
pub trait Game: Send + Sync + 'static {
    /// Variant, handicap, starting position and so on.
    type Setup: Clone + Send + Sync + 'static;

    /// A fresh game at its starting position.
    fn new(setup: &Self::Setup) -> Self;

    /// The position in the game's text notation (OFEN).
    fn position(&self) -> String;

    fn to_move(&self) -> Color;

    /// Every legal move in its encoded form. A submitted move is accepted
    /// only if it matches one of these exactly.
    fn legal_moves(&self) -> Vec<String>;

    /// Plays `mv` for the side to move. Returns `false` if the rules
    /// refuse it; the game must be unchanged in that case.
    fn apply(&mut self, mv: &str) -> bool;

    /// The result once the rules say the game is over.
    fn result(&self) -> Option<GameResult>;

    /// Whether the side to move is in check.
    fn in_check(&self) -> bool {
        false
    }

    fn score(&self) -> Score {
        Score::default()
    }
}
