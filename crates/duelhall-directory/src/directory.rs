use std::sync::Arc;

use duelhall_transport::{Connection, ConnectionId};
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::repository::{MemoryRepository, Repository};
use crate::DirectoryError;

/// All live channels, keyed by name.
///
/// Rooms use their id as channel name. The directory is shared by the
/// front door (which tracks sockets) and the room actor (which listens for
/// occupancy and broadcasts).
pub struct SocketDirectory<C> {
    channels: Arc<dyn Repository<String, Arc<Channel<C>>>>,
}

impl<C> Clone for SocketDirectory<C> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl<C: Connection> Default for SocketDirectory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> SocketDirectory<C> {
    pub fn new() -> Self {
        Self::with_repository(Arc::new(MemoryRepository::new()))
    }

    /// Uses `channels` as backing storage.
    pub fn with_repository(channels: Arc<dyn Repository<String, Arc<Channel<C>>>>) -> Self {
        Self { channels }
    }

    /// Returns the channel named `name`, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<Channel<C>> {
        self.channels
            .get_or_put_with(name.to_owned(), &mut || Arc::new(Channel::new(name)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel<C>>> {
        self.channels.get(&name.to_owned())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn channel(&self, name: &str) -> Result<Arc<Channel<C>>, DirectoryError> {
        self.get(name)
            .ok_or_else(|| DirectoryError::UnknownChannel(name.to_owned()))
    }

    pub async fn unicast(
        &self,
        data: &[u8],
        name: &str,
        id: ConnectionId,
    ) -> Result<(), DirectoryError> {
        self.channel(name)?.unicast(data, id).await
    }

    /// Broadcasts on `name`. An unknown channel delivers to nobody.
    pub async fn broadcast(&self, data: &[u8], name: &str) -> usize {
        match self.get(name) {
            Some(channel) => channel.broadcast(data).await,
            None => 0,
        }
    }

    pub async fn broadcast_except(&self, data: &[u8], name: &str, except: ConnectionId) -> usize {
        match self.get(name) {
            Some(channel) => channel.broadcast_except(data, except).await,
            None => 0,
        }
    }

    /// Removes the channel, closes all of its listeners and waits for its
    /// fan-out task to finish. Returns `false` if there was no such channel.
    pub async fn cleanup(&self, name: &str) -> bool {
        let Some(channel) = self.channels.delete(&name.to_owned()) else {
            return false;
        };
        if let Some(task) = channel.close() {
            if let Err(e) = task.await {
                warn!(channel = name, error = %e, "fan-out task did not exit cleanly");
            }
        }
        debug!(channel = name, "channel cleaned up");
        true
    }
}
