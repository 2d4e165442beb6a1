//! Room lifecycle for Duelhall.
//!
//! Each room runs as an isolated Tokio task (actor model) that referees
//! one match from the first join through any number of rematches.
//!
//! # Key types
//!
//! - [`Game`]: the rules trait a room referees
//! - [`RoomRegistry`]: creates rooms, finds them by id or invite token
//! - [`RoomHandle`]: send joins, moves and controls to a running room
//! - [`RoomState`] / [`RoomEvent`]: the lifecycle and its transition table
//! - [`RoomConfig`]: seats, time control and timeouts, validated up front
//! - [`EngineDispatcher`] / [`OraclePool`]: where bot moves come from
//! - [`Archiver`]: where finished games go

mod archive;
mod config;
mod engine;
mod error;
mod game;
mod handle;
mod registry;
mod room;
mod state;

pub use archive::{Archiver, ChannelArchiver, GameRecord, NoopArchiver};
pub use config::{MAX_BOT_DEPTH, RoomConfig, RoomTimeouts, Seat};
pub use engine::{EngineDispatcher, EngineRequest, Oracle, OraclePool};
pub use error::{RoomError, TransitionError};
pub use game::Game;
pub use handle::{Control, Membership, MoveRequest, Mover, RoomHandle, RoomInfo};
pub use registry::RoomRegistry;
pub use room::RoomServices;
pub use state::{RoomEvent, RoomState, TRANSITIONS};
