//! # Duelhall
//!
//! Server-authoritative rooms for two-player, turn-based games.
//!
//! A room seats two sides (humans or one bot), runs a chess clock, referees
//! every move against the game's rules and broadcasts the authoritative
//! board to everyone watching. Finished games can be rematched with colors
//! swapped. Game developers implement the [`Game`](duelhall_room::Game)
//! trait; Duelhall handles sockets, timing, abandonment and cleanup.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelhall::prelude::*;
//!
//! # async fn run<G: Game>(auth: impl Authenticator, setup: G::Setup) -> Result<(), DuelhallError> {
//! duelhall::init_tracing();
//! let hall: Duelhall<G> = DuelhallBuilder::new().build();
//! let config = hall.room_config(UserId(1), Seat::human(UserId(1)), Seat::open(), setup);
//! let room = hall.create_room(config)?;
//! println!("invite: {}", room.join_token());
//! hall.serve("0.0.0.0:8080", auth).await
//! # }
//! ```

mod auth;
mod error;
mod handler;
mod service;

pub use auth::Authenticator;
pub use error::DuelhallError;
pub use service::{Duelhall, DuelhallBuilder};

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

pub mod prelude {
    pub use crate::{Authenticator, Duelhall, DuelhallBuilder, DuelhallError};
    pub use duelhall_clock::{ClockConfig, TimeControl};
    pub use duelhall_protocol::{
        ClientMessage, Color, GameId, GameResult, Method, Outcome, RoomId, Score, SeatView,
        ServerEvent, Snapshot, UserId,
    };
    pub use duelhall_room::{
        Archiver, ChannelArchiver, EngineDispatcher, EngineRequest, Game, GameRecord, Membership,
        Oracle, OraclePool, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomState, RoomTimeouts,
        Seat,
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_tracing_only_once() {
        super::init_tracing();
        assert!(!super::init_tracing());
    }
}
