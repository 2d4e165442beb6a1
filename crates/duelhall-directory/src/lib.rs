//! # duelhall-directory
//!
//! Tracks which sockets are attached to which room and fans occupancy
//! changes out to listeners.
//!
//! - [`SocketDirectory`]: channels by name, with unicast and broadcast
//! - [`Channel`]: one room's sockets and its ordered occupancy feed
//! - [`Repository`]: the injected map the directory (and the room
//!   registry) store their entries in

mod channel;
mod directory;
pub mod error;
pub mod repository;

pub use channel::{Channel, Listener, ListenerId, Socket};
pub use directory::SocketDirectory;
pub use error::DirectoryError;
pub use repository::{MemoryRepository, Repository};
