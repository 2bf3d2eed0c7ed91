//! `roommud`: the shared-world core of a small multi-user room server.
//!
//! - [`world`]: immutable room graph, validated at construction.
//! - [`registry`]: the single synchronized collection of connected sessions.
//! - [`broadcast`]: "all but me" / "room but me" delivery on top of the registry.
//! - [`command`]: input line parsing.
//! - [`session`]: one task per connection: handshake, command loop, teardown.
//! - [`outbox`]: buffered per-connection writes with a kill switch for slow clients.

pub mod broadcast;
pub mod command;
pub mod config;
pub mod error;
pub mod outbox;
pub mod registry;
pub mod session;
pub mod world;

pub use config::SessionConfig;
pub use error::{RegistryError, WorldError};
pub use registry::{Registry, SessionId};
pub use world::{Direction, Room, RoomId, World};
