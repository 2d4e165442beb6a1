//! Per-connection handler: hello, auth, join, then frame routing.
//!
//! Each accepted socket gets its own Tokio task running this handler:
//!   1. Receive `Hello { room_id, token }` → find the room
//!   2. Authenticate the token (none → anonymous spectator)
//!   3. Join the room and track the socket on its channel
//!   4. Loop: decode client frames and route them to the room, until the
//!      client leaves or the room closes

use std::sync::Arc;

use duelhall_protocol::{ClientMessage, Codec, ServerEvent, UserId};
use duelhall_room::{Game, Membership, RoomError, RoomHandle};
use duelhall_transport::{Connection, ConnectionId, WebSocketConnection, WebSocketReader};
use tokio::time;
use tracing::{debug, info};

use crate::{Authenticator, Duelhall, DuelhallError};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G: Game, A: Authenticator>(
    hall: Duelhall<G>,
    auth: Arc<A>,
    conn: WebSocketConnection,
    mut reader: WebSocketReader,
) -> Result<(), DuelhallError> {
    let conn_id = conn.id();
    debug!(%conn_id, "handling new connection");

    let (room, uid) = match handshake(&hall, auth.as_ref(), &mut reader).await {
        Ok(found) => found,
        Err(e) => {
            refuse(&hall, &conn, &e).await;
            return Err(e);
        }
    };
    let room_id = room.room_id();

    let membership = attach(&hall, &room, conn, uid).await?;
    debug!(%room_id, %conn_id, ?membership, "joined");
    // Held so the socket can still be closed after the room drops it.
    let socket = hall
        .directory()
        .get(&room_id.to_string())
        .and_then(|channel| channel.get(conn_id));
    // The joiner needs the board now, not at the next move.
    let result = match hall.route(&room, uid, conn_id, ClientMessage::Resync).await {
        Ok(()) => relay(&hall, &room, uid, conn_id, &mut reader).await,
        Err(e) => Err(e),
    };

    hall.disconnect(room_id, conn_id);
    if let Some(socket) = socket {
        let _ = socket.connection().close().await;
    }
    result
}

/// Reads the `Hello` frame and resolves it to a room and an identity.
async fn handshake<G: Game, A: Authenticator>(
    hall: &Duelhall<G>,
    auth: &A,
    reader: &mut WebSocketReader,
) -> Result<(RoomHandle, Option<UserId>), DuelhallError> {
    let data = match time::timeout(hall.handshake_timeout, reader.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(DuelhallError::Handshake("closed before hello".into()));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(DuelhallError::Handshake("hello timed out".into())),
    };

    let hello: ClientMessage = hall.codec.decode(&data)?;
    let ClientMessage::Hello { room_id, token } = hello else {
        return Err(DuelhallError::Handshake("first frame must be hello".into()));
    };
    let room = hall.room(room_id)?;

    let uid = match token {
        Some(token) => Some(auth.authenticate(&token).await?),
        None => None,
    };
    info!(%room_id, ?uid, "hello accepted");
    Ok((room, uid))
}

/// Joins the room and tracks `conn` on its channel. A room that turns the
/// socket away gets it refused like a failed handshake.
async fn attach<G: Game, C: Connection>(
    hall: &Duelhall<G, C>,
    room: &RoomHandle,
    conn: C,
    uid: Option<UserId>,
) -> Result<Membership, DuelhallError> {
    let (membership, channel) = match hall.admit(room, uid).await {
        Ok(admitted) => admitted,
        Err(e) => {
            refuse(hall, &conn, &e).await;
            return Err(e);
        }
    };
    hall.track(room.room_id(), &channel, conn, uid, membership)?;
    Ok(membership)
}

/// Tells the client why it is being turned away, then closes the socket.
async fn refuse<G: Game, C: Connection>(hall: &Duelhall<G, C>, conn: &C, err: &DuelhallError) {
    let reason = match err {
        DuelhallError::AuthFailed(_) => "unauthorized".to_string(),
        DuelhallError::Room(RoomError::NotFound(_)) => "no such room".to_string(),
        DuelhallError::Room(RoomError::Unavailable(_)) => "room closed".to_string(),
        other => other.to_string(),
    };
    debug!(conn_id = %conn.id(), %reason, "connection refused");
    if let Ok(bytes) = hall.codec.encode(&ServerEvent::RoomOver { reason }) {
        let _ = conn.send(&bytes).await;
    }
    let _ = conn.close().await;
}

/// Routes client frames until the client leaves or the room closes.
async fn relay<G: Game>(
    hall: &Duelhall<G>,
    room: &RoomHandle,
    uid: Option<UserId>,
    conn_id: ConnectionId,
    reader: &mut WebSocketReader,
) -> Result<(), DuelhallError> {
    let room_id = room.room_id();
    loop {
        let frame = tokio::select! {
            _ = room.closed() => {
                debug!(%room_id, %conn_id, "room closed, dropping socket");
                return Ok(());
            }
            frame = reader.recv() => frame,
        };

        let data = match frame {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(%room_id, %conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let msg: ClientMessage = match hall.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%room_id, %conn_id, error = %e, "undecodable frame dropped");
                continue;
            }
        };

        match hall.route(room, uid, conn_id, msg).await {
            Ok(()) => {}
            Err(DuelhallError::Room(RoomError::Unavailable(_))) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}
