//! The engine seam: how a room gets moves for its bot seat.
//!
//! A room never waits on the engine. It submits a request carrying a
//! clone of its move sender and keeps serving other events; the reply
//! arrives later as an ordinary [`MoveRequest`] tagged with the game it
//! was computed for, so an answer for a game that has since been replaced
//! is dropped on arrival.

use std::sync::Arc;

use duelhall_protocol::{GameId, RoomId};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, warn};

use crate::{MoveRequest, RoomError};

/// One request for a bot move.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub room_id: RoomId,
    pub game_id: GameId,
    /// The position to search, in the game's notation.
    pub position: String,
    pub depth: u8,
    /// Where to send the chosen move.
    pub reply: mpsc::Sender<MoveRequest>,
}

impl EngineRequest {
    /// Sends `mv` back to the room as a bot move for this request's game.
    pub async fn respond(&self, mv: impl Into<String>) -> bool {
        self.reply
            .send(MoveRequest::bot(self.game_id, mv))
            .await
            .is_ok()
    }
}

/// Accepts engine requests without blocking the caller.
pub trait EngineDispatcher: Send + Sync + 'static {
    /// Queues `request`. Must return promptly.
    ///
    /// # Errors
    /// [`RoomError::Engine`] if the request can't be queued.
    fn submit(&self, request: EngineRequest) -> Result<(), RoomError>;
}

/// A move search. Blocking and CPU-bound.
pub trait Oracle: Send + Sync + 'static {
    /// The best move in `position` searching to `depth`, or `None` if the
    /// side to move has no move.
    fn best_move(&self, position: &str, depth: u8) -> Option<String>;
}

/// [`EngineDispatcher`] that runs an [`Oracle`] on the blocking thread
/// pool, at most `workers` searches at a time.
pub struct OraclePool<O> {
    oracle: Arc<O>,
    permits: Arc<Semaphore>,
}

impl<O: Oracle> OraclePool<O> {
    pub fn new(oracle: O, workers: usize) -> Self {
        Self {
            oracle: Arc::new(oracle),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }
}

impl<O: Oracle> EngineDispatcher for OraclePool<O> {
    fn submit(&self, request: EngineRequest) -> Result<(), RoomError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RoomError::Engine(e.to_string()))?;
        let oracle = Arc::clone(&self.oracle);
        let permits = Arc::clone(&self.permits);
        runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let position = request.position.clone();
            let depth = request.depth;
            let searched =
                tokio::task::spawn_blocking(move || oracle.best_move(&position, depth)).await;
            match searched {
                Ok(Some(mv)) => {
                    if !request.respond(mv).await {
                        debug!(room_id = %request.room_id, "room gone before engine replied");
                    }
                }
                Ok(None) => {
                    warn!(room_id = %request.room_id, game_id = %request.game_id, "engine found no move");
                }
                Err(e) => {
                    error!(room_id = %request.room_id, error = %e, "engine search panicked");
                }
            }
        });
        Ok(())
    }
}
