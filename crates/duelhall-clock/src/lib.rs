//! Two-sided game clock for Duelhall.
//!
//! A [`Clock`] counts down each side's budget with optional per-move
//! delay and increment. It runs as its own Tokio task: callers send it
//! commands and read consistent [`ClockState`]s.
//!
//! # Integration
//!
//! The room drives it from its move loop and listens for the flag:
//!
//! ```ignore
//! let mut flags = clock.take_updates().expect("fresh clock");
//! clock.start();
//! clock.flip().await?;            // first move, free
//! loop {
//!     tokio::select! {
//!         Some(mv) = moves.recv() => { apply(mv); clock.flip().await?; }
//!         Some(state) = flags.recv() => { if state.flagged.is_some() { break } }
//!     }
//! }
//! ```

mod clock;
mod config;
mod core;
mod error;

pub use clock::Clock;
pub use config::{ClockConfig, TimeControl};
pub use core::ClockState;
pub use error::ClockError;
