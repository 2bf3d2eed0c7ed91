use crate::registry::SessionId;
use crate::world::{Direction, RoomId};

/// Static world data is inconsistent. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    EmptyWorld,
    DuplicateRoom(RoomId),
    DanglingExit {
        room: RoomId,
        dir: Direction,
        to: RoomId,
    },
    UnknownStartRoom(RoomId),
    Parse(String),
}

impl std::fmt::Display for WorldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::EmptyWorld => write!(f, "world has no rooms"),
            WorldError::DuplicateRoom(id) => write!(f, "duplicate room id: {id}"),
            WorldError::DanglingExit { room, dir, to } => {
                write!(f, "room {room}: exit {dir} points to missing room {to}")
            }
            WorldError::UnknownStartRoom(id) => write!(f, "start room {id} does not exist"),
            WorldError::Parse(s) => write!(f, "parse world: {s}"),
        }
    }
}

impl std::error::Error for WorldError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateSession(SessionId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateSession(id) => write!(f, "session already registered: {id}"),
        }
    }
}

impl std::error::Error for RegistryError {}
