//! The outside world's view of a room: messages in, a handle to send them
//! through, and the replies that come back.

use std::sync::Arc;

use duelhall_protocol::{Color, GameId, GameResult, RoomId, SeatView, UserId};
use duelhall_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{RoomError, RoomState};

/// Who submitted a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    /// The engine, answering a request the room made.
    Bot,
    User(UserId),
}

/// A move submitted to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    /// The game this move was meant for. Moves for any other game are
    /// dropped.
    pub game_id: GameId,
    pub from: Mover,
    /// The move in the game's encoding.
    pub mv: String,
    /// Where to send a fresh snapshot if the move is refused.
    pub conn: Option<ConnectionId>,
}

impl MoveRequest {
    pub fn user(game_id: GameId, uid: UserId, mv: impl Into<String>) -> Self {
        Self {
            game_id,
            from: Mover::User(uid),
            mv: mv.into(),
            conn: None,
        }
    }

    pub fn bot(game_id: GameId, mv: impl Into<String>) -> Self {
        Self {
            game_id,
            from: Mover::Bot,
            mv: mv.into(),
            conn: None,
        }
    }

    pub fn via(mut self, conn: ConnectionId) -> Self {
        self.conn = Some(conn);
        self
    }
}

/// Out-of-band requests that aren't moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// `uid` gives up the current game.
    Resign { uid: UserId },
    /// Send the current snapshot to one connection.
    Resync { conn: ConnectionId },
}

/// How a joining user relates to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    /// The color this user plays, if seated.
    pub color: Option<Color>,
    pub spectator: bool,
}

impl Membership {
    pub(crate) fn player(color: Color) -> Self {
        Self {
            color: Some(color),
            spectator: false,
        }
    }

    pub(crate) fn spectator() -> Self {
        Self {
            color: None,
            spectator: true,
        }
    }

    /// Neither player nor spectator: the room is closing.
    pub(crate) fn refused() -> Self {
        Self {
            color: None,
            spectator: false,
        }
    }

    pub fn is_player(&self) -> bool {
        self.color.is_some()
    }

    pub fn is_spectator(&self) -> bool {
        self.spectator
    }
}

/// A snapshot of room metadata (not the board).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub state: RoomState,
    /// Sockets currently attached.
    pub crowd: usize,
    pub white: SeatView,
    pub black: SeatView,
    pub game_id: GameId,
    /// Result of the current game, once it has one.
    pub result: Option<GameResult>,
}

pub(crate) enum Command {
    Join {
        uid: Option<UserId>,
        reply: oneshot::Sender<Membership>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    Rematch {
        uid: UserId,
        reply: oneshot::Sender<bool>,
    },
    Control(Control),
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Handle to a running room actor.
///
/// Cheap to clone. Every method is safe to call from any task; the room
/// processes requests one at a time in its own task.
#[derive(Clone)]
pub struct RoomHandle {
    pub(crate) room_id: RoomId,
    pub(crate) creator: UserId,
    pub(crate) join_token: Arc<str>,
    pub(crate) cancel_token: Arc<str>,
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) moves: mpsc::Sender<MoveRequest>,
    pub(crate) state: watch::Receiver<RoomState>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn creator(&self) -> UserId {
        self.creator
    }

    /// Token that lets an invited user find this room.
    pub fn join_token(&self) -> &str {
        &self.join_token
    }

    /// Token that authorizes [`cancel`](Self::cancel).
    pub fn cancel_token(&self) -> &str {
        &self.cancel_token
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Announces `uid` (or an anonymous viewer) to the room.
    ///
    /// A user already seated gets their color back. While the room is
    /// still filling, an authenticated user takes the first open seat.
    /// Everyone else watches.
    pub async fn join(&self, uid: Option<UserId>) -> Result<Membership, RoomError> {
        self.request(|reply| Command::Join { uid, reply }).await
    }

    /// Abandons the room before its first game has started. Returns
    /// `false` once play is under way.
    pub async fn cancel(&self) -> Result<bool, RoomError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Records `uid`'s agreement to a rematch. Returns `false` if `uid`
    /// isn't seated or no game has just ended.
    pub async fn request_rematch(&self, uid: UserId) -> Result<bool, RoomError> {
        self.request(|reply| Command::Rematch { uid, reply }).await
    }

    /// Queues a move. Moves are processed strictly in arrival order; this
    /// waits while the previous one is still being handled.
    pub async fn submit_move(&self, request: MoveRequest) -> Result<(), RoomError> {
        self.moves
            .send(request)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn submit_control(&self, control: Control) -> Result<(), RoomError> {
        self.commands
            .send(Command::Control(control))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| Command::Info { reply }).await
    }

    /// The room's current state.
    pub fn state(&self) -> RoomState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn watch(&self) -> watch::Receiver<RoomState> {
        self.state.clone()
    }

    /// Waits until the room is in `target`.
    ///
    /// # Errors
    /// [`RoomError::Unavailable`] if the room shuts down first.
    pub async fn wait_for(&self, target: RoomState) -> Result<RoomState, RoomError> {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == target)
            .await
            .map(|s| *s)
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Waits until the room has finished its cleanup.
    pub async fn closed(&self) {
        let mut rx = self.state.clone();
        while rx.changed().await.is_ok() {}
    }
}
