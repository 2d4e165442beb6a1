//! One handler per room state. Each runs until its exit condition fires
//! and returns the event that picks the next state.

use duelhall_clock::ClockError;
use duelhall_protocol::{Color, GameResult, Method, Outcome, ServerEvent, UserId};
use duelhall_transport::Connection;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Room, deadline_after, recv_opt, sleep_until_opt};
use crate::handle::{Command, Control, MoveRequest};
use crate::{Game, RoomError, RoomEvent};

impl<G: Game, C: Connection> Room<G, C> {
    /// Waits until every seat is filled and present. An empty room gives
    /// up after `waiting_for_players`.
    pub(super) async fn waiting_for_players(&mut self) -> Result<RoomEvent, RoomError> {
        let mut expiry = (self.channel.count() == 0)
            .then(|| deadline_after(self.timeouts.waiting_for_players))
            .flatten();

        loop {
            if self.both_present() {
                return Ok(RoomEvent::PlayersReady);
            }
            tokio::select! {
                biased;

                Some(cmd) = self.commands.recv() => {
                    if let Some(event) = self.on_command(cmd).await {
                        return Ok(event);
                    }
                }

                Some(count) = self.occupancy.recv() => {
                    self.broadcast_crowd(count).await;
                    if count == 0 {
                        if expiry.is_none() {
                            debug!(room_id = %self.id, "room empty, expiry armed");
                            expiry = deadline_after(self.timeouts.waiting_for_players);
                        }
                    } else {
                        expiry = None;
                    }
                }

                Some(req) = self.moves.recv() => {
                    debug!(room_id = %self.id, "move before the game started");
                    self.resync(req.conn).await;
                }

                _ = sleep_until_opt(expiry) => {
                    info!(room_id = %self.id, "nobody joined in time");
                    self.abandoned = true;
                    return Ok(RoomEvent::Abandon);
                }
            }
        }
    }

    /// Shows the fresh board and waits for the side to move to play.
    ///
    /// The clock starts with the first accepted move. A move the rules
    /// refuse after it was accepted rewinds the clock.
    pub(super) async fn game_ready(&mut self) -> Result<RoomEvent, RoomError> {
        self.broadcast_snapshot().await;
        self.request_bot_move();
        let deadline = deadline_after(self.timeouts.first_move);

        loop {
            tokio::select! {
                biased;

                Some(cmd) = self.commands.recv() => {
                    if let Some(event) = self.on_command(cmd).await {
                        return Ok(event);
                    }
                }

                Some(count) = self.occupancy.recv() => {
                    self.broadcast_crowd(count).await;
                }

                Some(req) = self.moves.recv() => {
                    if self.arbitrate(&req).await.is_none() {
                        continue;
                    }
                    self.clock.start();
                    if !self.play(&req.mv) {
                        warn!(room_id = %self.id, mv = %req.mv, "first move refused by the rules");
                        self.clock.reset();
                        self.resync(req.conn).await;
                        self.request_bot_move();
                        continue;
                    }
                    self.clock.flip().await?;
                    self.broadcast_snapshot().await;
                    return Ok(RoomEvent::FirstMove);
                }

                _ = sleep_until_opt(deadline) => {
                    info!(room_id = %self.id, game_id = %self.game_id, "no first move in time");
                    self.abandoned = true;
                    return Ok(RoomEvent::Abandon);
                }
            }
        }
    }

    /// The game proper. Every way it can end goes through
    /// [`try_game_over`](Self::try_game_over).
    pub(super) async fn game_ongoing(&mut self) -> Result<RoomEvent, RoomError> {
        let mut clock_updates = self.clock.take_updates();
        let mut abandon_at = None;
        self.rearm_abandonment(&mut abandon_at);

        if let Some(result) = self.game.result() {
            return self.try_game_over(result).await;
        }
        self.request_bot_move();

        loop {
            tokio::select! {
                biased;

                Some(reading) = recv_opt(&mut clock_updates) => {
                    if let Some(color) = reading.flagged {
                        info!(room_id = %self.id, %color, "flag fell");
                        return self.try_game_over(GameResult::timeout(color)).await;
                    }
                }

                Some(cmd) = self.commands.recv() => match cmd {
                    Command::Control(Control::Resign { uid }) => {
                        if let Some(color) = self.color_of(uid) {
                            info!(room_id = %self.id, %uid, %color, "resigned");
                            return self.try_game_over(GameResult::resignation(color)).await;
                        }
                        debug!(room_id = %self.id, %uid, "resign from a non-player ignored");
                    }
                    other => {
                        if let Some(event) = self.on_command(other).await {
                            return Ok(event);
                        }
                    }
                },

                Some(req) = self.moves.recv() => {
                    if let Some(result) = self.on_move(req).await? {
                        return self.try_game_over(result).await;
                    }
                }

                Some(count) = self.occupancy.recv() => {
                    self.broadcast_crowd(count).await;
                    self.rearm_abandonment(&mut abandon_at);
                }

                _ = sleep_until_opt(abandon_at) => {
                    abandon_at = None;
                    if let Some(result) = self.abandonment_result()? {
                        return self.try_game_over(result).await;
                    }
                }
            }
        }
    }

    /// Plays one move mid-game. Returns a result when the move (or the
    /// clock) ended the game.
    async fn on_move(&mut self, req: MoveRequest) -> Result<Option<GameResult>, RoomError> {
        let Some(color) = self.arbitrate(&req).await else {
            return Ok(None);
        };
        if let Some(flagged) = self.clock.state().flagged {
            return Ok(Some(GameResult::timeout(flagged)));
        }
        if !self.play(&req.mv) {
            warn!(room_id = %self.id, mv = %req.mv, "move refused by the rules");
            self.resync(req.conn).await;
            return Ok(None);
        }
        match self.clock.flip().await {
            Ok(reading) => {
                if let Some(flagged) = reading.flagged {
                    return Ok(Some(GameResult::timeout(flagged)));
                }
            }
            // The loop exits when the flag falls; the reading says who.
            Err(ClockError::Closed) => match self.clock.state().flagged {
                Some(flagged) => return Ok(Some(GameResult::timeout(flagged))),
                None => return Err(ClockError::Closed.into()),
            },
            Err(e) => return Err(e.into()),
        }
        debug!(room_id = %self.id, %color, mv = %req.mv, "move played");

        self.broadcast_snapshot().await;
        if let Some(result) = self.game.result() {
            return Ok(Some(result));
        }
        self.request_bot_move();
        Ok(None)
    }

    /// Arms the abandonment timer while a side is missing and disarms it
    /// once both are back.
    fn rearm_abandonment(&self, at: &mut Option<Instant>) {
        if self.both_present() {
            if at.take().is_some() {
                debug!(room_id = %self.id, "both sides back, abandonment timer cancelled");
            }
        } else if at.is_none() {
            debug!(room_id = %self.id, "side missing, abandonment timer armed");
            *at = deadline_after(self.timeouts.abandonment);
        }
    }

    /// A draw when nobody stayed; otherwise the missing side loses.
    fn abandonment_result(&self) -> Result<Option<GameResult>, RoomError> {
        let outcome = match (
            self.side_present(Color::White),
            self.side_present(Color::Black),
        ) {
            (true, true) => return Ok(None),
            (false, false) => Outcome::Draw,
            (true, false) => Outcome::WhiteWins,
            (false, true) => Outcome::BlackWins,
        };
        info!(room_id = %self.id, ?outcome, "game abandoned");
        GameResult::new(outcome, Method::Abandonment)
            .map(Some)
            .map_err(|e| RoomError::Invariant(e.to_string()))
    }

    /// Opens the rematch window. Bots agree on the spot.
    pub(super) async fn game_over(&mut self) -> Result<RoomEvent, RoomError> {
        self.rematch = [false; 2];
        if let Some(color) = self.bot_color() {
            self.rematch[color.index()] = true;
        }
        let deadline = deadline_after(self.timeouts.rematch);

        loop {
            tokio::select! {
                biased;

                Some(cmd) = self.commands.recv() => match cmd {
                    Command::Rematch { uid, reply } => {
                        let agreed = self.agree_to_rematch(uid).await;
                        let _ = reply.send(agreed);
                        if self.rematch == [true, true] {
                            self.start_rematch().await;
                            return Ok(RoomEvent::Rematch);
                        }
                    }
                    other => {
                        if let Some(event) = self.on_command(other).await {
                            return Ok(event);
                        }
                    }
                },

                Some(count) = self.occupancy.recv() => {
                    self.broadcast_crowd(count).await;
                }

                Some(req) = self.moves.recv() => {
                    if req.game_id == self.game_id {
                        self.resync(req.conn).await;
                    }
                }

                _ = sleep_until_opt(deadline) => {
                    info!(room_id = %self.id, "rematch window closed");
                    return Ok(RoomEvent::Close);
                }
            }
        }
    }

    async fn agree_to_rematch(&mut self, uid: UserId) -> bool {
        let Some(color) = self.color_of(uid) else {
            debug!(room_id = %self.id, %uid, "rematch from a non-player");
            return false;
        };
        if !self.rematch[color.index()] {
            self.rematch[color.index()] = true;
            info!(room_id = %self.id, %uid, %color, "rematch requested");
            self.broadcast(&ServerEvent::RematchRequested { color }).await;
        }
        true
    }

    /// Terminal. Tells whoever is still watching why the room closed.
    pub(super) async fn room_over(&mut self) {
        if self.cancelled {
            self.broadcast(&ServerEvent::Redirect { room_id: self.id })
                .await;
        } else if self.abandoned && self.result.is_none() {
            self.broadcast(&ServerEvent::RoomOver {
                reason: "the room was abandoned before a result".into(),
            })
            .await;
        }
        self.clock.stop(false).await;
    }
}
