//! `Duelhall` service and its builder.
//!
//! The service ties the layers together: it owns the room registry and the
//! socket directory, creates rooms with the configured defaults, attaches
//! sockets to rooms and routes client frames to them. [`serve`] adds the
//! WebSocket accept loop on top.
//!
//! [`serve`]: Duelhall::serve

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use duelhall_clock::ClockConfig;
use duelhall_directory::{Channel, Socket, SocketDirectory};
use duelhall_protocol::{ClientMessage, JsonCodec, RoomId, UserId};
use duelhall_room::{
    Archiver, Control, EngineDispatcher, Game, Membership, MoveRequest, NoopArchiver, RoomConfig,
    RoomError, RoomHandle, RoomRegistry, RoomServices, RoomTimeouts, Seat,
};
use duelhall_transport::{Connection, ConnectionId, WebSocketConnection, WebSocketListener};
use tracing::{debug, error, info};

use crate::handler::handle_connection;
use crate::{Authenticator, DuelhallError};

/// How long a fresh socket has to send its `Hello`.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for a [`Duelhall`] service.
///
/// ```rust,no_run
/// # use duelhall::prelude::*;
/// # async fn run<G: Game>(auth: impl Authenticator) -> Result<(), DuelhallError> {
/// let hall: Duelhall<G> = DuelhallBuilder::new()
///     .timeouts(RoomTimeouts::default())
///     .build();
/// hall.serve("0.0.0.0:8080", auth).await
/// # }
/// ```
pub struct DuelhallBuilder {
    timeouts: RoomTimeouts,
    clock: ClockConfig,
    engine: Option<Arc<dyn EngineDispatcher>>,
    archiver: Arc<dyn Archiver>,
    handshake_timeout: Duration,
}

impl DuelhallBuilder {
    pub fn new() -> Self {
        Self {
            timeouts: RoomTimeouts::default(),
            clock: ClockConfig::default(),
            engine: None,
            archiver: Arc::new(NoopArchiver),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Timeouts for rooms made with [`Duelhall::room_config`].
    pub fn timeouts(mut self, timeouts: RoomTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Time control for rooms made with [`Duelhall::room_config`].
    pub fn clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    /// Plays bot seats. Without one, rooms with a bot are refused.
    pub fn engine(mut self, engine: impl EngineDispatcher) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn archiver(mut self, archiver: impl Archiver) -> Self {
        self.archiver = Arc::new(archiver);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn build<G: Game, C: Connection>(self) -> Duelhall<G, C> {
        let directory = SocketDirectory::new();
        let mut services = RoomServices::new(directory.clone());
        if let Some(engine) = self.engine {
            services = services.with_engine(engine);
        }
        services = services.with_archiver(self.archiver);
        Duelhall {
            registry: RoomRegistry::new(),
            directory,
            services,
            timeouts: self.timeouts,
            clock: self.clock,
            handshake_timeout: self.handshake_timeout,
            codec: JsonCodec,
            _game: PhantomData,
        }
    }
}

impl Default for DuelhallBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A match server for game `G`, writing to sockets of type `C`.
///
/// Cheap to clone; clones share every room and socket.
pub struct Duelhall<G: Game, C: Connection = WebSocketConnection> {
    registry: RoomRegistry,
    directory: SocketDirectory<C>,
    services: RoomServices<C>,
    timeouts: RoomTimeouts,
    clock: ClockConfig,
    pub(crate) handshake_timeout: Duration,
    pub(crate) codec: JsonCodec,
    _game: PhantomData<fn() -> G>,
}

impl<G: Game, C: Connection> Clone for Duelhall<G, C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            directory: self.directory.clone(),
            services: self.services.clone(),
            timeouts: self.timeouts,
            clock: self.clock,
            handshake_timeout: self.handshake_timeout,
            codec: self.codec,
            _game: PhantomData,
        }
    }
}

impl<G: Game, C: Connection> Duelhall<G, C> {
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &SocketDirectory<C> {
        &self.directory
    }

    /// A room config carrying this service's clock and timeouts.
    pub fn room_config(
        &self,
        creator: UserId,
        white: Seat,
        black: Seat,
        setup: G::Setup,
    ) -> RoomConfig<G::Setup> {
        RoomConfig::new(creator, white, black, setup)
            .with_clock(self.clock)
            .with_timeouts(self.timeouts)
    }

    /// Validates `config` and starts a room.
    ///
    /// # Errors
    /// [`RoomError::InvalidConfig`] if the config can't make a game.
    pub fn create_room(&self, config: RoomConfig<G::Setup>) -> Result<RoomHandle, DuelhallError> {
        Ok(self.registry.create::<G, C>(config, &self.services)?)
    }

    /// # Errors
    /// [`RoomError::NotFound`] if no live room has this id.
    pub fn room(&self, room_id: RoomId) -> Result<RoomHandle, DuelhallError> {
        self.registry
            .get(room_id)
            .ok_or(DuelhallError::Room(RoomError::NotFound(room_id)))
    }

    /// Resolves an invite link.
    pub fn find_by_join_token(&self, token: &str) -> Option<RoomHandle> {
        self.registry.find_by_join_token(token)
    }

    /// Cancels a room on behalf of whoever holds its cancel token.
    ///
    /// Returns `false` when the room is past the point where it can be
    /// cancelled.
    ///
    /// # Errors
    /// [`DuelhallError::BadCancelToken`] if `token` doesn't match.
    pub async fn cancel(&self, room_id: RoomId, token: &str) -> Result<bool, DuelhallError> {
        let room = self.room(room_id)?;
        if room.cancel_token() != token {
            debug!(%room_id, "cancel with a wrong token");
            return Err(DuelhallError::BadCancelToken(room_id));
        }
        Ok(room.cancel().await?)
    }

    /// Joins `uid` to the room without attaching a socket yet. Returns the
    /// membership and the channel the socket should be tracked on.
    ///
    /// # Errors
    /// [`RoomError::Unavailable`] if the room is closing or gone.
    pub async fn admit(
        &self,
        room: &RoomHandle,
        uid: Option<UserId>,
    ) -> Result<(Membership, Arc<Channel<C>>), DuelhallError> {
        let room_id = room.room_id();
        // Looked up before joining, so a closing room never claims a seat.
        let channel = self
            .directory
            .get(&room_id.to_string())
            .ok_or(RoomError::Unavailable(room_id))?;
        let membership = room.join(uid).await?;
        if !membership.is_player() && !membership.is_spectator() {
            return Err(RoomError::Unavailable(room_id).into());
        }
        Ok((membership, channel))
    }

    /// Joins `uid` to the room and starts delivering its broadcasts to
    /// `conn`.
    ///
    /// # Errors
    /// [`RoomError::Unavailable`] if the room is closing or gone.
    pub async fn connect(
        &self,
        room: &RoomHandle,
        conn: C,
        uid: Option<UserId>,
    ) -> Result<Membership, DuelhallError> {
        let (membership, channel) = self.admit(room, uid).await?;
        self.track(room.room_id(), &channel, conn, uid, membership)?;
        Ok(membership)
    }

    pub(crate) fn track(
        &self,
        room_id: RoomId,
        channel: &Channel<C>,
        conn: C,
        uid: Option<UserId>,
        membership: Membership,
    ) -> Result<(), DuelhallError> {
        let conn_id = conn.id();
        let crowd = channel.track(Socket::new(conn, uid))?;
        info!(%room_id, %conn_id, ?uid, color = ?membership.color, crowd, "socket connected");
        Ok(())
    }

    /// Stops delivering to `conn`. Returns its socket if it was tracked.
    pub fn disconnect(&self, room_id: RoomId, conn: ConnectionId) -> Option<Arc<Socket<C>>> {
        let socket = self.directory.get(&room_id.to_string())?.untrack(conn);
        if socket.is_some() {
            info!(%room_id, %conn, "socket disconnected");
        }
        socket
    }

    /// Hands one client frame to the room.
    ///
    /// Anonymous sockets may only ask for a resync.
    ///
    /// # Errors
    /// [`RoomError::Unavailable`] once the room has closed.
    pub async fn route(
        &self,
        room: &RoomHandle,
        uid: Option<UserId>,
        conn: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), DuelhallError> {
        let room_id = room.room_id();
        match (msg, uid) {
            (ClientMessage::Resync, _) => {
                room.submit_control(Control::Resync { conn }).await?;
            }
            (ClientMessage::Move { game_id, mv }, Some(uid)) => {
                room.submit_move(MoveRequest::user(game_id, uid, mv).via(conn))
                    .await?;
            }
            (ClientMessage::Resign, Some(uid)) => {
                room.submit_control(Control::Resign { uid }).await?;
            }
            (ClientMessage::Rematch, Some(uid)) => {
                if !room.request_rematch(uid).await? {
                    debug!(%room_id, %uid, "rematch request refused");
                }
            }
            (ClientMessage::Hello { .. }, _) => {
                debug!(%room_id, %conn, "repeated hello ignored");
            }
            (msg, None) => {
                debug!(%room_id, %conn, ?msg, "anonymous socket can only watch");
                room.submit_control(Control::Resync { conn }).await?;
            }
        }
        Ok(())
    }
}

impl<G: Game> Duelhall<G, WebSocketConnection> {
    /// Binds `addr` and serves WebSocket clients until the process ends.
    ///
    /// # Errors
    /// [`TransportError::AcceptFailed`](duelhall_transport::TransportError)
    /// if the address can't be bound.
    pub async fn serve(&self, addr: &str, auth: impl Authenticator) -> Result<(), DuelhallError> {
        let listener = WebSocketListener::bind(addr).await?;
        self.serve_listener(listener, auth).await
    }

    /// Runs the accept loop on an already bound listener.
    ///
    /// Every accepted socket gets its own task that performs the `Hello`
    /// handshake, joins the room and relays frames until either side goes
    /// away.
    pub async fn serve_listener(
        &self,
        listener: WebSocketListener,
        auth: impl Authenticator,
    ) -> Result<(), DuelhallError> {
        let auth = Arc::new(auth);
        info!(addr = ?listener.local_addr().ok(), "duelhall serving");
        loop {
            match listener.accept().await {
                Ok((conn, reader)) => {
                    let hall = self.clone();
                    let auth = Arc::clone(&auth);
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        if let Err(e) = handle_connection(hall, auth, conn, reader).await {
                            debug!(%conn_id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
    }
}
