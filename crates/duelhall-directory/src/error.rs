//! Error types for the socket directory.

use duelhall_transport::{ConnectionId, TransportError};

/// Errors that can occur while tracking or writing to sockets.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The channel was cleaned up; it accepts no more sockets.
    #[error("channel {0} is closed")]
    Closed(String),

    /// No socket with this id is tracked on the channel.
    #[error("{conn} is not tracked on channel {channel}")]
    NotTracked {
        channel: String,
        conn: ConnectionId,
    },

    /// No entry exists for this channel name.
    #[error("unknown channel {0}")]
    UnknownChannel(String),

    /// The write itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
