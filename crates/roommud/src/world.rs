//! Static room graph.
//!
//! Built once before the listener accepts anything and never mutated afterwards, so it is
//! shared as `Arc<World>` and read without locking.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::WorldError;

/// The world the server runs when no world file is configured.
pub const DEFAULT_WORLD_YAML: &str = include_str!("../../../world/default.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Full names plus the single-letter aliases (`n`, `e`, `s`, `w`).
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "north" | "n" => Some(Direction::North),
            "east" | "e" => Some(Direction::East),
            "south" | "s" => Some(Direction::South),
            "west" | "w" => Some(Direction::West),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    // keyword (lowercase) -> text
    extra: BTreeMap<String, String>,
    exits: BTreeMap<Direction, RoomId>,
}

impl Room {
    pub fn new(id: RoomId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            extra: BTreeMap::new(),
            exits: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, keyword: &str, text: impl Into<String>) -> Self {
        self.extra
            .insert(keyword.trim().to_ascii_lowercase(), text.into());
        self
    }

    pub fn with_exit(mut self, dir: Direction, to: RoomId) -> Self {
        self.exits.insert(dir, to);
        self
    }

    pub fn exit(&self, dir: Direction) -> Option<RoomId> {
        self.exits.get(&dir).copied()
    }

    pub fn exits(&self) -> impl Iterator<Item = (Direction, RoomId)> + '_ {
        self.exits.iter().map(|(d, to)| (*d, *to))
    }

    /// Extra description for `keyword`, case-insensitive. Empty texts count as absent.
    pub fn extra(&self, keyword: &str) -> Option<&str> {
        let k = keyword.trim().to_ascii_lowercase();
        self.extra
            .get(&k)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Room name, description, then one line per other occupant.
    pub fn render(&self, occupants: &[String]) -> String {
        let mut s = String::with_capacity(self.name.len() + self.description.len() + 4);
        s.push_str(&self.name);
        s.push_str("\r\n");
        s.push_str(&self.description);
        s.push_str("\r\n");
        for name in occupants {
            s.push_str(name);
            s.push_str(" is standing here.\r\n");
        }
        s
    }
}

#[derive(Debug, Clone)]
pub struct World {
    rooms: HashMap<RoomId, Room>,
    start_room: RoomId,
}

impl World {
    /// Build and validate a world. `start_room` defaults to the first room given.
    ///
    /// Every exit must resolve to a room in `rooms`; anything else is corrupt data.
    pub fn new(rooms: Vec<Room>, start_room: Option<RoomId>) -> Result<Self, WorldError> {
        let first = rooms.first().map(|r| r.id).ok_or(WorldError::EmptyWorld)?;
        let start_room = start_room.unwrap_or(first);

        let mut by_id = HashMap::with_capacity(rooms.len());
        for r in rooms {
            let id = r.id;
            if by_id.insert(id, r).is_some() {
                return Err(WorldError::DuplicateRoom(id));
            }
        }

        // Deterministic error reporting regardless of HashMap order.
        let mut ids = by_id.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        for id in ids {
            let room = &by_id[&id];
            for (dir, to) in room.exits() {
                if !by_id.contains_key(&to) {
                    return Err(WorldError::DanglingExit { room: id, dir, to });
                }
            }
        }

        if !by_id.contains_key(&start_room) {
            return Err(WorldError::UnknownStartRoom(start_room));
        }

        Ok(Self {
            rooms: by_id,
            start_room,
        })
    }

    /// Parse a YAML world document (see `world/default.yaml`).
    pub fn from_yaml(s: &str) -> Result<Self, WorldError> {
        let f = serde_yaml::from_str::<WorldFile>(s)
            .map_err(|e| WorldError::Parse(e.to_string()))?;

        let mut rooms = Vec::with_capacity(f.rooms.len());
        for r in f.rooms {
            let mut room = Room::new(r.id, r.name.trim(), r.desc.unwrap_or_default().trim());
            for (k, v) in r.extra {
                room = room.with_extra(&k, v.trim());
            }
            for (dir, to) in r.exits {
                // Integer world data uses 0 for "no exit".
                if to.0 != 0 {
                    room = room.with_exit(dir, to);
                }
            }
            rooms.push(room);
        }

        Self::new(rooms, f.start_room)
    }

    pub fn default_world() -> Result<Self, WorldError> {
        Self::from_yaml(DEFAULT_WORLD_YAML)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn start_room(&self) -> RoomId {
        self.start_room
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorldFile {
    start_room: Option<RoomId>,
    rooms: Vec<RoomFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoomFile {
    id: RoomId,
    name: String,
    desc: Option<String>,
    #[serde(default)]
    extra: BTreeMap<String, String>,
    #[serde(default)]
    exits: BTreeMap<Direction, RoomId>,
}
