//! Room actor: one task per match.
//!
//! The actor owns the game, the clock and the room's half of the socket
//! directory. It runs one handler per [`RoomState`]; each handler returns
//! the [`RoomEvent`] that selects the next one.
//!
//! ```text
//!  RoomHandle ──commands──┐
//!  RoomHandle ──moves─────┤
//!  engine replies ────────┼──▶ state handler ──▶ RoomEvent ──▶ transition table
//!  clock updates ─────────┤         │
//!  occupancy listener ────┘         └──▶ broadcasts via SocketDirectory
//! ```
//!
//! Whatever way the actor ends (normal exit, error, panic), the room's
//! directory channel is cleaned up and it leaves the registry.

mod handlers;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use duelhall_clock::{Clock, ClockConfig};
use duelhall_directory::{Channel, Listener, SocketDirectory};
use duelhall_protocol::{
    Codec, Color, GameId, GameResult, JsonCodec, RoomId, ServerEvent, Snapshot, UserId,
};
use duelhall_transport::{Connection, ConnectionId};
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::archive::{Archiver, GameRecord, NoopArchiver};
use crate::engine::{EngineDispatcher, EngineRequest};
use crate::handle::{Command, Control, Membership, MoveRequest, Mover, RoomHandle, RoomInfo};
use crate::{
    Game, RoomConfig, RoomError, RoomEvent, RoomRegistry, RoomState, RoomTimeouts, Seat,
};

/// Capacity of a room's command channel.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Collaborators every room in a process shares.
pub struct RoomServices<C> {
    pub directory: SocketDirectory<C>,
    /// Plays bot seats. Rooms with a bot seat can't be created without one.
    pub engine: Option<Arc<dyn EngineDispatcher>>,
    pub archiver: Arc<dyn Archiver>,
}

impl<C> Clone for RoomServices<C> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            engine: self.engine.clone(),
            archiver: Arc::clone(&self.archiver),
        }
    }
}

impl<C: Connection> RoomServices<C> {
    /// No engine, and finished games are discarded.
    pub fn new(directory: SocketDirectory<C>) -> Self {
        Self {
            directory,
            engine: None,
            archiver: Arc::new(NoopArchiver),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn EngineDispatcher>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }
}

/// A random 128-bit hex token.
fn token() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Builds a room and the task that runs it. The caller registers the
/// handle and then spawns the task.
pub(crate) fn build<G: Game, C: Connection>(
    room_id: RoomId,
    config: RoomConfig<G::Setup>,
    services: RoomServices<C>,
    registry: RoomRegistry,
) -> (RoomHandle, impl Future<Output = ()> + Send + 'static) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    // Capacity one: a second move waits until the first is taken.
    let (moves_tx, moves_rx) = mpsc::channel(1);
    let (state_tx, state_rx) = watch::channel(RoomState::Init);
    let state_tx = Arc::new(state_tx);

    let channel = services.directory.get_or_create(&room_id.to_string());
    let occupancy = channel.listen();

    let mut clock_config = config.clock;
    clock_config.ack_timeout = config.timeouts.clock_ack;

    let handle = RoomHandle {
        room_id,
        creator: config.creator,
        join_token: token().into(),
        cancel_token: token().into(),
        commands: commands_tx,
        moves: moves_tx.clone(),
        state: state_rx,
    };

    let cleanup = Cleanup {
        room_id,
        directory: services.directory.clone(),
        registry: registry.clone(),
        state: Arc::clone(&state_tx),
    };

    let room = Room::<G, C> {
        id: room_id,
        state: RoomState::Init,
        state_tx,
        seats: [config.white, config.black],
        clock_config,
        timeouts: config.timeouts,
        game_id: registry.next_game_id(),
        game: G::new(&config.setup),
        setup: config.setup,
        moves_played: Vec::new(),
        clock: Clock::new(clock_config),
        result: None,
        rematch: [false; 2],
        abandoned: false,
        cancelled: false,
        commands: commands_rx,
        moves: moves_rx,
        moves_tx,
        channel,
        occupancy,
        services,
        registry,
        codec: JsonCodec,
    };

    (handle, supervise(room, cleanup))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Runs the room, then cleans up no matter how it ended.
async fn supervise<G: Game, C: Connection>(room: Room<G, C>, cleanup: Cleanup<C>) {
    let room_id = room.id;
    match AssertUnwindSafe(room.run()).catch_unwind().await {
        Ok(Ok(())) => debug!(%room_id, "room loop finished"),
        Ok(Err(e)) => error!(%room_id, error = %e, "room failed"),
        Err(panic) => error!(%room_id, panic = panic_message(&*panic), "room panicked"),
    }
    cleanup.run().await;
}

struct Cleanup<C> {
    room_id: RoomId,
    directory: SocketDirectory<C>,
    registry: RoomRegistry,
    state: Arc<watch::Sender<RoomState>>,
}

impl<C: Connection> Cleanup<C> {
    async fn run(self) {
        self.state.send_replace(RoomState::RoomOver);
        self.directory.cleanup(&self.room_id.to_string()).await;
        self.registry.remove(self.room_id);
        info!(room_id = %self.room_id, "room closed");
        // Dropping the last state sender tells `RoomHandle::closed` waiters.
    }
}

/// `after` from now, or `None` when that instant can't be represented; such
/// a timer never fires.
fn deadline_after(after: Duration) -> Option<Instant> {
    Instant::now().checked_add(after)
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Receives from `rx`, or waits forever when there is no receiver.
async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

struct Room<G: Game, C: Connection> {
    id: RoomId,
    state: RoomState,
    state_tx: Arc<watch::Sender<RoomState>>,
    /// Indexed by [`Color::index`].
    seats: [Seat; 2],
    clock_config: ClockConfig,
    setup: G::Setup,
    timeouts: RoomTimeouts,

    game_id: GameId,
    game: G,
    moves_played: Vec<String>,
    clock: Clock,
    result: Option<GameResult>,
    /// Per color: agreed to a rematch.
    rematch: [bool; 2],
    /// Closed by a timer before the game produced a result.
    abandoned: bool,
    cancelled: bool,

    commands: mpsc::Receiver<Command>,
    moves: mpsc::Receiver<MoveRequest>,
    /// Handed to the engine so bot moves arrive on `moves`.
    moves_tx: mpsc::Sender<MoveRequest>,
    channel: Arc<Channel<C>>,
    occupancy: Listener,

    services: RoomServices<C>,
    registry: RoomRegistry,
    codec: JsonCodec,
}

impl<G: Game, C: Connection> Room<G, C> {
    async fn run(mut self) -> Result<(), RoomError> {
        info!(room_id = %self.id, game_id = %self.game_id, "room actor started");
        self.fire(RoomEvent::Open)?;
        loop {
            let event = match self.state {
                RoomState::Init => {
                    return Err(RoomError::Invariant("room loop reached Init".into()));
                }
                RoomState::WaitingForPlayers => self.waiting_for_players().await?,
                RoomState::GameReady => self.game_ready().await?,
                RoomState::GameOngoing => self.game_ongoing().await?,
                RoomState::GameOver => self.game_over().await?,
                RoomState::RoomOver => {
                    self.room_over().await;
                    return Ok(());
                }
            };
            self.fire(event)?;
        }
    }

    /// Moves along the declared edge for `event`.
    fn fire(&mut self, event: RoomEvent) -> Result<(), RoomError> {
        let next = self.state.on(event)?;
        info!(room_id = %self.id, from = %self.state, to = %next, ?event, "room transition");
        self.state = next;
        self.state_tx.send_replace(next);
        Ok(())
    }

    // -- seats -------------------------------------------------------------

    fn seat(&self, color: Color) -> Seat {
        self.seats[color.index()]
    }

    fn color_of(&self, uid: UserId) -> Option<Color> {
        Color::BOTH
            .into_iter()
            .find(|c| self.seat(*c).user() == Some(uid))
    }

    fn bot_color(&self) -> Option<Color> {
        Color::BOTH.into_iter().find(|c| self.seat(*c).is_bot())
    }

    /// Bots are always present; a human side is present while one of its
    /// user's sockets is tracked on the room's channel.
    fn side_present(&self, color: Color) -> bool {
        match self.seat(color) {
            Seat::Bot { .. } => true,
            Seat::Human(Some(uid)) => self.channel.is_connected(uid),
            Seat::Human(None) => false,
        }
    }

    fn both_present(&self) -> bool {
        Color::BOTH.into_iter().all(|c| self.side_present(c))
    }

    async fn admit(&mut self, uid: Option<UserId>) -> Membership {
        if self.state.is_terminal() {
            return Membership::refused();
        }
        let Some(uid) = uid else {
            return Membership::spectator();
        };
        if let Some(color) = self.color_of(uid) {
            return Membership::player(color);
        }
        if self.state.is_joinable() {
            let open = Color::BOTH
                .into_iter()
                .find(|c| self.seat(*c) == Seat::open());
            if let Some(color) = open {
                self.seats[color.index()] = Seat::human(uid);
                info!(room_id = %self.id, %uid, %color, "seat claimed");
                self.broadcast_snapshot().await;
                return Membership::player(color);
            }
        }
        Membership::spectator()
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id,
            state: self.state,
            crowd: self.channel.count(),
            white: self.seat(Color::White).view(),
            black: self.seat(Color::Black).view(),
            game_id: self.game_id,
            result: self.result.clone(),
        }
    }

    // -- outbound ----------------------------------------------------------

    /// Board, legal moves, clock and score, all read at the same moment.
    fn snapshot(&self) -> Snapshot {
        let finished = self.result.is_some();
        Snapshot {
            room_id: self.id,
            game_id: self.game_id,
            position: self.game.position(),
            legal_moves: if finished {
                Vec::new()
            } else {
                self.game.legal_moves()
            },
            to_move: self.game.to_move(),
            clock: self.clock.state().readout(),
            check: self.game.in_check(),
            score: self.game.score(),
            white: self.seat(Color::White).view(),
            black: self.seat(Color::Black).view(),
            finished,
        }
    }

    fn encode(&self, event: &ServerEvent) -> Option<Vec<u8>> {
        match self.codec.encode(event) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(room_id = %self.id, error = %e, "failed to encode event");
                None
            }
        }
    }

    async fn broadcast(&self, event: &ServerEvent) {
        if let Some(bytes) = self.encode(event) {
            self.channel.broadcast(&bytes).await;
        }
    }

    async fn broadcast_snapshot(&self) {
        self.broadcast(&ServerEvent::Snapshot(self.snapshot())).await;
    }

    async fn broadcast_crowd(&self, count: usize) {
        self.broadcast(&ServerEvent::Crowd { count }).await;
    }

    /// Sends the authoritative snapshot to one connection.
    async fn resync(&self, conn: Option<ConnectionId>) {
        let Some(conn) = conn else {
            return;
        };
        let Some(bytes) = self.encode(&ServerEvent::Snapshot(self.snapshot())) else {
            return;
        };
        if let Err(e) = self.channel.unicast(&bytes, conn).await {
            debug!(room_id = %self.id, %conn, error = %e, "resync not delivered");
        }
    }

    // -- inbound -----------------------------------------------------------

    /// Handles requests every state answers the same way. Returns an event
    /// when the request ends the current state.
    async fn on_command(&mut self, cmd: Command) -> Option<RoomEvent> {
        match cmd {
            Command::Join { uid, reply } => {
                let membership = self.admit(uid).await;
                let _ = reply.send(membership);
                None
            }
            Command::Cancel { reply } => {
                let allowed = matches!(
                    self.state,
                    RoomState::WaitingForPlayers | RoomState::GameReady
                );
                let _ = reply.send(allowed);
                if !allowed {
                    debug!(room_id = %self.id, state = %self.state, "cancel refused");
                    return None;
                }
                info!(room_id = %self.id, "room cancelled");
                self.cancelled = true;
                Some(RoomEvent::Abandon)
            }
            Command::Rematch { uid, reply } => {
                debug!(room_id = %self.id, %uid, state = %self.state, "rematch outside game over");
                let _ = reply.send(false);
                None
            }
            Command::Control(Control::Resync { conn }) => {
                self.resync(Some(conn)).await;
                None
            }
            Command::Control(Control::Resign { uid }) => {
                debug!(room_id = %self.id, %uid, state = %self.state, "resign outside a game");
                None
            }
            Command::Info { reply } => {
                let _ = reply.send(self.info());
                None
            }
        }
    }

    /// Decides whether `req` may be played now and returns the mover.
    ///
    /// Moves for another game are dropped. Moves out of turn or not in the
    /// legal list leave the game untouched; the sender gets a fresh
    /// snapshot instead.
    async fn arbitrate(&self, req: &MoveRequest) -> Option<Color> {
        if req.game_id != self.game_id {
            debug!(room_id = %self.id, stale = %req.game_id, current = %self.game_id, "stale move dropped");
            return None;
        }
        let to_move = self.game.to_move();
        let mover = match req.from {
            Mover::Bot => self.bot_color(),
            Mover::User(uid) => self.color_of(uid),
        };
        if mover != Some(to_move) {
            debug!(room_id = %self.id, from = ?req.from, %to_move, "move out of turn");
            self.resync(req.conn).await;
            return None;
        }
        if !self.game.legal_moves().iter().any(|m| *m == req.mv) {
            debug!(room_id = %self.id, mv = %req.mv, "move not legal");
            self.resync(req.conn).await;
            return None;
        }
        Some(to_move)
    }

    /// Applies an arbitrated move to the game.
    fn play(&mut self, mv: &str) -> bool {
        if self.game.apply(mv) {
            self.moves_played.push(mv.to_owned());
            true
        } else {
            false
        }
    }

    /// Asks the engine for a move when the bot is on turn.
    fn request_bot_move(&self) {
        let Seat::Bot { depth } = self.seat(self.game.to_move()) else {
            return;
        };
        if self.result.is_some() || self.game.result().is_some() {
            return;
        }
        let Some(engine) = &self.services.engine else {
            warn!(room_id = %self.id, "bot on turn but no engine configured");
            return;
        };
        let request = EngineRequest {
            room_id: self.id,
            game_id: self.game_id,
            position: self.game.position(),
            depth,
            reply: self.moves_tx.clone(),
        };
        match engine.submit(request) {
            Ok(()) => debug!(room_id = %self.id, game_id = %self.game_id, depth, "bot move requested"),
            Err(e) => warn!(room_id = %self.id, error = %e, "bot move request failed"),
        }
    }

    // -- ending a game -----------------------------------------------------

    /// The one place a game ends: records `result`, stops the clock,
    /// tells everyone and archives the game.
    async fn try_game_over(&mut self, result: GameResult) -> Result<RoomEvent, RoomError> {
        GameResult::new(result.outcome(), result.method())
            .map_err(|e| RoomError::Invariant(e.to_string()))?;

        let clock = self.clock.stop(false).await;
        info!(room_id = %self.id, game_id = %self.game_id, %result, "game over");
        self.result = Some(result.clone());

        self.broadcast_snapshot().await;
        self.broadcast(&ServerEvent::GameOver {
            outcome: result.outcome(),
            reason: result.reason(),
            score: self.game.score(),
        })
        .await;

        self.services.archiver.archive(GameRecord {
            room_id: self.id,
            game_id: self.game_id,
            white: self.seat(Color::White),
            black: self.seat(Color::Black),
            moves: self.moves_played.clone(),
            final_position: self.game.position(),
            result,
            clock: clock.readout(),
        });
        Ok(RoomEvent::GameEnded)
    }

    /// Swaps colors and puts a fresh game and clock on the table.
    async fn start_rematch(&mut self) {
        self.seats.swap(0, 1);
        self.clock_config = self.clock_config.swapped();
        self.game_id = self.registry.next_game_id();
        self.game = G::new(&self.setup);
        self.moves_played.clear();
        self.clock = Clock::new(self.clock_config);
        self.result = None;
        self.rematch = [false; 2];
        info!(room_id = %self.id, game_id = %self.game_id, "rematch started");
        self.broadcast(&ServerEvent::Rematch {
            game_id: self.game_id,
        })
        .await;
    }
}
