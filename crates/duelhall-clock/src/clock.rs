//! The clock actor.
//!
//! One task owns every time mutation. Callers talk to it over a command
//! channel; reads go through the same lock the task writes under, so a
//! reading is never half-updated.
//!
//! ```text
//!  Room ──flip──▶ commands ──▶ run loop ──charge under lock──▶ ack ──▶ Room
//!                                  │
//!                 flag timer ──────┴──▶ updates (flagged / final state)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use duelhall_protocol::Color;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::core::ClockCore;
use crate::{ClockConfig, ClockError, ClockState};

enum Command {
    Flip { ack: oneshot::Sender<ClockState> },
    Pause { ack: oneshot::Sender<ClockState> },
    Resume { ack: oneshot::Sender<ClockState> },
    Stop {
        publish: bool,
        ack: oneshot::Sender<ClockState>,
    },
}

fn lock(core: &Mutex<ClockCore>) -> MutexGuard<'_, ClockCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleeps until `deadline`, or forever when there is none. Inside a
/// `select!` a `None` deadline simply never wins.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// A two-sided countdown clock for one game.
///
/// Lifecycle: [`new`](Self::new) → [`start`](Self::start) →
/// [`flip`](Self::flip)… → [`stop`](Self::stop). [`reset`](Self::reset)
/// returns it to the freshly-constructed state with new channels.
pub struct Clock {
    config: ClockConfig,
    core: Arc<Mutex<ClockCore>>,
    commands: Option<mpsc::UnboundedSender<Command>>,
    updates_tx: Option<mpsc::UnboundedSender<ClockState>>,
    updates_rx: Option<mpsc::UnboundedReceiver<ClockState>>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl Clock {
    /// Creates a stopped clock. Nothing runs until [`start`](Self::start).
    pub fn new(config: ClockConfig) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            config,
            core: Arc::new(Mutex::new(ClockCore::new(config))),
            commands: None,
            updates_tx: Some(updates_tx),
            updates_rx: Some(updates_rx),
            task: None,
            closed: false,
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Starts the countdown and spawns the command loop.
    ///
    /// Must be called from within a Tokio runtime. Starting twice, or
    /// after [`stop`](Self::stop), is a no-op.
    pub fn start(&mut self) {
        if self.commands.is_some() || self.closed {
            debug!("clock already started or closed, ignoring start");
            return;
        }
        let Some(updates) = self.updates_tx.clone() else {
            return;
        };
        lock(&self.core).start(Instant::now());

        let (tx, rx) = mpsc::unbounded_channel();
        self.commands = Some(tx);
        self.task = Some(tokio::spawn(run(Arc::clone(&self.core), rx, updates)));
        debug!("clock started");
    }

    pub fn is_started(&self) -> bool {
        self.commands.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Charges the side that just moved and passes the turn.
    ///
    /// Blocks until the command loop confirms the charge was applied, so
    /// two moves in quick succession can never double-charge or skip a
    /// charge. The wait is bounded by `ack_timeout`.
    pub async fn flip(&self) -> Result<ClockState, ClockError> {
        self.request(|ack| Command::Flip { ack }).await
    }

    /// Stops time from accruing for the side to move.
    pub async fn pause(&self) -> Result<ClockState, ClockError> {
        self.request(|ack| Command::Pause { ack }).await
    }

    pub async fn resume(&self) -> Result<ClockState, ClockError> {
        self.request(|ack| Command::Resume { ack }).await
    }

    async fn request<F>(&self, build: F) -> Result<ClockState, ClockError>
    where
        F: FnOnce(oneshot::Sender<ClockState>) -> Command,
    {
        let Some(tx) = &self.commands else {
            return Err(ClockError::Closed);
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(build(ack_tx)).map_err(|_| ClockError::Closed)?;
        let guard = self.config.ack_timeout;
        match time::timeout(guard, ack_rx).await {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) => Err(ClockError::Closed),
            Err(_) => Err(ClockError::Unresponsive(guard)),
        }
    }

    /// Stops the clock for good.
    ///
    /// With `publish`, the final reading is also sent on the updates
    /// channel before it closes. Commands sent afterwards fail with
    /// [`ClockError::Closed`]. Returns the final reading.
    pub async fn stop(&mut self, publish: bool) -> ClockState {
        let result = match self.commands.take() {
            Some(tx) => {
                let (ack_tx, ack_rx) = oneshot::channel();
                if tx.send(Command::Stop { publish, ack: ack_tx }).is_ok() {
                    time::timeout(self.config.ack_timeout, ack_rx)
                        .await
                        .ok()
                        .and_then(Result::ok)
                } else {
                    None
                }
            }
            None => None,
        };
        let state = match result {
            Some(state) => state,
            None => {
                // Loop never started or already exited.
                let state = {
                    let mut core = lock(&self.core);
                    core.stop(Instant::now());
                    core.state(Instant::now())
                };
                if publish {
                    if let Some(tx) = &self.updates_tx {
                        let _ = tx.send(state);
                    }
                }
                state
            }
        };
        self.updates_tx = None;
        self.closed = true;
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
            }
        }
        debug!(?state.flagged, "clock stopped");
        state
    }

    /// Clears both sides' elapsed time and allocates fresh channels.
    ///
    /// Any running loop is told to exit by dropping its command sender. A
    /// previously taken updates receiver sees its channel close.
    pub fn reset(&mut self) {
        self.commands = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        lock(&self.core).reset();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        self.updates_tx = Some(updates_tx);
        self.updates_rx = Some(updates_rx);
        self.closed = false;
        debug!("clock reset");
    }

    /// Hands out the receiver for flag / final-state updates. Only the first
    /// call after construction or [`reset`](Self::reset) gets it.
    pub fn take_updates(&mut self) -> Option<mpsc::UnboundedReceiver<ClockState>> {
        self.updates_rx.take()
    }

    /// Consistent reading right now, with the flag re-evaluated.
    pub fn state(&self) -> ClockState {
        lock(&self.core).state(Instant::now())
    }

    /// Projected remaining time for `color`.
    pub fn estimate_remaining(&self, color: Color) -> Duration {
        lock(&self.core).estimate(color, Instant::now())
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    core: Arc<Mutex<ClockCore>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    updates: mpsc::UnboundedSender<ClockState>,
) {
    loop {
        let flag_at = lock(&core).flag_deadline();

        tokio::select! {
            biased;

            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    debug!("clock command channel closed");
                    break;
                };
                match cmd {
                    Command::Flip { ack } => {
                        let state = {
                            let mut core = lock(&core);
                            let now = Instant::now();
                            core.flip(now);
                            core.state(now)
                        };
                        if ack.send(state).is_err() {
                            warn!("flip acknowledgement dropped by caller");
                        }
                        if let Some(color) = state.flagged {
                            info!(%color, "flag fell on flip");
                            let _ = updates.send(state);
                            break;
                        }
                    }
                    Command::Pause { ack } => {
                        let state = {
                            let mut core = lock(&core);
                            let now = Instant::now();
                            core.pause(now);
                            core.state(now)
                        };
                        let _ = ack.send(state);
                    }
                    Command::Resume { ack } => {
                        let state = {
                            let mut core = lock(&core);
                            let now = Instant::now();
                            core.resume(now);
                            core.state(now)
                        };
                        let _ = ack.send(state);
                    }
                    Command::Stop { publish, ack } => {
                        let state = {
                            let mut core = lock(&core);
                            let now = Instant::now();
                            core.stop(now);
                            core.state(now)
                        };
                        if publish {
                            let _ = updates.send(state);
                        }
                        let _ = ack.send(state);
                        break;
                    }
                }
            }

            _ = sleep_until_opt(flag_at) => {
                let state = {
                    let mut core = lock(&core);
                    let now = Instant::now();
                    core.check_flag(now);
                    core.state(now)
                };
                if let Some(color) = state.flagged {
                    info!(%color, "flag fell");
                    let _ = updates.send(state);
                    break;
                }
            }
        }
    }
    debug!("clock loop exited");
}
