//! Room registry: creates rooms and finds them again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use duelhall_directory::{MemoryRepository, Repository};
use duelhall_protocol::{GameId, RoomId};
use duelhall_transport::Connection;
use tracing::info;

use crate::room::{self, RoomServices};
use crate::{Game, RoomConfig, RoomError, RoomHandle};

/// Process-wide `RoomId → RoomHandle` lookup.
///
/// Rooms are added by [`create`](Self::create) and remove themselves when
/// they reach their terminal state. Cloning shares the same registry.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<dyn Repository<RoomId, RoomHandle>>,
    next_room: Arc<AtomicU64>,
    next_game: Arc<AtomicU64>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_repository(Arc::new(MemoryRepository::new()))
    }

    pub fn with_repository(rooms: Arc<dyn Repository<RoomId, RoomHandle>>) -> Self {
        Self {
            rooms,
            next_room: Arc::new(AtomicU64::new(1)),
            next_game: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Validates `config`, then spawns the room and registers it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`RoomError::InvalidConfig`] if the seats, clock or timeouts can't
    /// make a game. Nothing is spawned in that case.
    pub fn create<G: Game, C: Connection>(
        &self,
        config: RoomConfig<G::Setup>,
        services: &RoomServices<C>,
    ) -> Result<RoomHandle, RoomError> {
        config.validate(services.engine.is_some())?;

        let room_id = RoomId(self.next_room.fetch_add(1, Ordering::Relaxed));
        let (handle, task) = room::build::<G, C>(room_id, config, services.clone(), self.clone());
        // Registered before the task runs, so the room's own cleanup
        // always finds its entry.
        self.rooms.put(room_id, handle.clone());
        tokio::spawn(task);
        info!(%room_id, creator = %handle.creator(), "room created");
        Ok(handle)
    }

    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&room_id)
    }

    pub(crate) fn remove(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.delete(&room_id)
    }

    /// Finds the room an invite token belongs to.
    pub fn find_by_join_token(&self, token: &str) -> Option<RoomHandle> {
        let mut found = None;
        self.rooms.range(&mut |_, handle| {
            if handle.join_token() == token {
                found = Some(handle.clone());
                false
            } else {
                true
            }
        });
        found
    }

    /// Handles to every live room.
    pub fn handles(&self) -> Vec<RoomHandle> {
        let mut all = Vec::with_capacity(self.rooms.len());
        self.rooms.range(&mut |_, handle| {
            all.push(handle.clone());
            true
        });
        all
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub(crate) fn next_game_id(&self) -> GameId {
        GameId(self.next_game.fetch_add(1, Ordering::Relaxed))
    }
}
