//! Hand-off of finished games to storage.

use duelhall_protocol::{ClockReadout, GameId, GameResult, RoomId};
use tokio::sync::mpsc;
use tracing::warn;

use crate::Seat;

/// A read-only copy of a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub room_id: RoomId,
    pub game_id: GameId,
    pub white: Seat,
    pub black: Seat,
    /// Every accepted move, in order.
    pub moves: Vec<String>,
    pub final_position: String,
    pub result: GameResult,
    pub clock: ClockReadout,
}

/// Receives finished games. `archive` must not block: the room calls it
/// on the path that ends the match.
pub trait Archiver: Send + Sync + 'static {
    fn archive(&self, record: GameRecord);
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopArchiver;

impl Archiver for NoopArchiver {
    fn archive(&self, _record: GameRecord) {}
}

/// Queues records for an async writer that owns the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelArchiver {
    tx: mpsc::UnboundedSender<GameRecord>,
}

impl ChannelArchiver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GameRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Archiver for ChannelArchiver {
    fn archive(&self, record: GameRecord) {
        let game_id = record.game_id;
        if self.tx.send(record).is_err() {
            warn!(%game_id, "archive writer gone, record dropped");
        }
    }
}
