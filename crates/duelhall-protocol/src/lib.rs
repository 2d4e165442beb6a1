//! Wire-facing types for Duelhall.
//!
//! - **Identity** ([`UserId`], [`RoomId`], [`GameId`], [`Color`])
//! - **Results** ([`GameResult`], [`Outcome`], [`Method`]) with the
//!   outcome/method pairing checked at construction
//! - **Payloads** ([`Snapshot`], [`ServerEvent`], [`ClientMessage`])
//! - **Codec** ([`Codec`] trait, [`JsonCodec`])
//!
//! Nothing in here knows about rooms, clocks or sockets. The room core
//! builds these values and the codec turns them into bytes.

mod codec;
mod error;
mod result;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use result::{GameResult, Method, Outcome};
pub use types::{
    ClientMessage, ClockReadout, Color, GameId, RoomId, Score, SeatView, ServerEvent,
    Snapshot, UserId,
};
