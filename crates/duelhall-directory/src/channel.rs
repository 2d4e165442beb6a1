//! One named channel: the sockets on it and its occupancy fan-out.
//!
//! ```text
//!  track / untrack ──┐
//!  listen / unlisten ┼──▶ fan-out queue ──▶ fan-out task ──▶ listener 1
//!                    │      (ordered)                    └──▶ listener 2
//!                    └─ enqueued while the socket lock is held
//! ```
//!
//! Occupancy changes and subscriptions share one queue, so a listener that
//! subscribes right after a `track` first sees the count that `track`
//! produced, and counts reach every listener in the order they happened.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use duelhall_protocol::UserId;
use duelhall_transport::{Connection, ConnectionId, TransportError};
use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::DirectoryError;

/// A tracked connection with its own write lock.
///
/// Writes to the same socket are serialized; writes to different sockets
/// proceed in parallel.
pub struct Socket<C> {
    conn: C,
    user: Option<UserId>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<C: Connection> Socket<C> {
    pub fn new(conn: C, user: Option<UserId>) -> Self {
        Self {
            conn,
            user,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// The authenticated user behind this socket; `None` for anonymous
    /// spectators.
    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        let _guard = self.write_lock.lock().await;
        self.conn.send(data).await
    }
}

/// Identifies one occupancy subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives the channel's socket count after every change.
///
/// The first value is the count at subscription time. `recv` returns
/// `None` once the channel is cleaned up or the listener is removed.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<usize>,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<usize> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<usize> {
        self.rx.try_recv().ok()
    }
}

enum Fanout {
    Update(usize),
    Subscribe {
        id: ListenerId,
        tx: mpsc::UnboundedSender<usize>,
        current: usize,
    },
    Unsubscribe(ListenerId),
}

struct Inner<C> {
    sockets: HashMap<ConnectionId, Arc<Socket<C>>>,
    /// `None` once cleaned up.
    fanout: Option<mpsc::UnboundedSender<Fanout>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// The sockets attached to one room, plus occupancy notifications.
pub struct Channel<C> {
    name: String,
    inner: Mutex<Inner<C>>,
    next_listener: AtomicU64,
}

impl<C: Connection> Channel<C> {
    /// Creates the channel and spawns its fan-out task. Must be called
    /// from within a Tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(fan_out(name.clone(), rx, shutdown_rx));
        Self {
            name,
            inner: Mutex::new(Inner {
                sockets: HashMap::new(),
                fanout: Some(tx),
                shutdown: Some(shutdown_tx),
                task: Some(task),
            }),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a socket and publishes the new count. Tracking an id that is
    /// already present replaces the old socket.
    pub fn track(&self, socket: Socket<C>) -> Result<usize, DirectoryError> {
        let id = socket.id();
        let mut inner = self.lock();
        let Some(fanout) = inner.fanout.clone() else {
            return Err(DirectoryError::Closed(self.name.clone()));
        };
        inner.sockets.insert(id, Arc::new(socket));
        let count = inner.sockets.len();
        let _ = fanout.send(Fanout::Update(count));
        debug!(channel = %self.name, conn = %id, count, "socket tracked");
        Ok(count)
    }

    /// Removes a socket and publishes the new count. Returns the socket if
    /// it was tracked.
    pub fn untrack(&self, id: ConnectionId) -> Option<Arc<Socket<C>>> {
        let mut inner = self.lock();
        let removed = inner.sockets.remove(&id);
        let count = inner.sockets.len();
        if let Some(fanout) = &inner.fanout {
            let _ = fanout.send(Fanout::Update(count));
        }
        debug!(channel = %self.name, conn = %id, count, "socket untracked");
        removed
    }

    /// Subscribes to occupancy changes.
    ///
    /// On a cleaned-up channel the returned listener is already closed.
    pub fn listen(&self) -> Listener {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = self.lock();
        if let Some(fanout) = &inner.fanout {
            let current = inner.sockets.len();
            let _ = fanout.send(Fanout::Subscribe { id, tx, current });
        }
        Listener { id, rx }
    }

    pub fn unlisten(&self, id: ListenerId) {
        if let Some(fanout) = &self.lock().fanout {
            let _ = fanout.send(Fanout::Unsubscribe(id));
        }
    }

    pub fn count(&self) -> usize {
        self.lock().sockets.len()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Socket<C>>> {
        self.lock().sockets.get(&id).cloned()
    }

    /// Whether any tracked socket belongs to `user`.
    pub fn is_connected(&self, user: UserId) -> bool {
        self.lock()
            .sockets
            .values()
            .any(|s| s.user() == Some(user))
    }

    pub fn connected_users(&self) -> HashSet<UserId> {
        self.lock()
            .sockets
            .values()
            .filter_map(|s| s.user())
            .collect()
    }

    fn snapshot(&self, except: Option<ConnectionId>) -> Vec<Arc<Socket<C>>> {
        self.lock()
            .sockets
            .values()
            .filter(|s| Some(s.id()) != except)
            .cloned()
            .collect()
    }

    /// Writes to one socket.
    pub async fn unicast(&self, data: &[u8], id: ConnectionId) -> Result<(), DirectoryError> {
        let socket = self.get(id).ok_or_else(|| DirectoryError::NotTracked {
            channel: self.name.clone(),
            conn: id,
        })?;
        socket.write(data).await?;
        Ok(())
    }

    /// Writes to every tracked socket. A failed write is logged and does
    /// not stop the others. Returns how many writes succeeded.
    pub async fn broadcast(&self, data: &[u8]) -> usize {
        self.write_all(data, None).await
    }

    /// Like [`broadcast`](Self::broadcast), skipping `except`.
    pub async fn broadcast_except(&self, data: &[u8], except: ConnectionId) -> usize {
        self.write_all(data, Some(except)).await
    }

    async fn write_all(&self, data: &[u8], except: Option<ConnectionId>) -> usize {
        let sockets = self.snapshot(except);
        let results = join_all(sockets.iter().map(|s| s.write(data))).await;
        let mut delivered = 0;
        for (socket, result) in sockets.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(channel = %self.name, conn = %socket.id(), error = %e, "broadcast write failed");
                }
            }
        }
        delivered
    }

    /// Closes the fan-out and every listener, and forgets all sockets.
    ///
    /// Returns the fan-out task so the caller can wait for it; `None` if
    /// the channel was already closed.
    pub(crate) fn close(&self) -> Option<JoinHandle<()>> {
        let mut inner = self.lock();
        inner.fanout = None;
        inner.sockets.clear();
        if let Some(shutdown) = inner.shutdown.take() {
            let _ = shutdown.send(());
        }
        inner.task.take()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().fanout.is_none()
    }
}

impl<C> Drop for Channel<C> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }
}

async fn fan_out(
    name: String,
    mut queue: mpsc::UnboundedReceiver<Fanout>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut listeners: Vec<(ListenerId, mpsc::UnboundedSender<usize>)> = Vec::new();
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            msg = queue.recv() => match msg {
                None => break,
                Some(Fanout::Update(count)) => {
                    listeners.retain(|(_, tx)| tx.send(count).is_ok());
                }
                Some(Fanout::Subscribe { id, tx, current }) => {
                    if tx.send(current).is_ok() {
                        listeners.push((id, tx));
                    }
                }
                Some(Fanout::Unsubscribe(id)) => {
                    listeners.retain(|(l, _)| *l != id);
                }
            },
        }
    }
    trace!(channel = %name, listeners = listeners.len(), "fan-out exited");
}
