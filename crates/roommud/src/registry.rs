//! The one shared, mutable collection of connected sessions.
//!
//! Everything that reads or writes the set of sessions goes through the registry's mutex:
//! register, unregister, room changes and every broadcast fan-out. Fan-out never awaits
//! while holding the lock (delivery is a non-blocking queue push), so the critical
//! sections stay short and a stuck client can't wedge the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::error::RegistryError;
use crate::outbox::Outbox;
use crate::world::RoomId;

/// Allocated once per connection from a monotonic counter; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub room: RoomId,
    pub outbox: Outbox,
}

/// Locked view of the registered sessions.
#[derive(Debug, Default)]
pub struct Roster {
    members: HashMap<SessionId, Member>,
}

impl Roster {
    pub fn get(&self, id: SessionId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn insert(&mut self, id: SessionId, member: Member) -> Result<(), RegistryError> {
        if self.members.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }
        self.members.insert(id, member);
        Ok(())
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Member> {
        self.members.remove(&id)
    }

    /// Move a member to `room`, returning the room it was in.
    pub fn set_room(&mut self, id: SessionId, room: RoomId) -> Option<RoomId> {
        let m = self.members.get_mut(&id)?;
        Some(std::mem::replace(&mut m.room, room))
    }

    pub fn for_each_except(&self, except: SessionId, mut f: impl FnMut(SessionId, &Member)) {
        for (id, m) in &self.members {
            if *id != except {
                f(*id, m);
            }
        }
    }

    pub fn for_each_in_room_except(
        &self,
        except: SessionId,
        room: RoomId,
        mut f: impl FnMut(SessionId, &Member),
    ) {
        self.for_each_except(except, |id, m| {
            if m.room == room {
                f(id, m);
            }
        });
    }

    /// Names of everyone in `room` but `except`, sorted.
    pub fn names_in_room_except(&self, except: SessionId, room: RoomId) -> Vec<String> {
        let mut names = Vec::new();
        self.for_each_in_room_except(except, room, |_, m| names.push(m.name.clone()));
        names.sort();
        names
    }
}

#[derive(Debug)]
pub struct Registry {
    roster: Mutex<Roster>,
    next_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            roster: Mutex::new(Roster::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn allocate_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn register(&self, id: SessionId, member: Member) -> Result<(), RegistryError> {
        self.roster.lock().await.insert(id, member)
    }

    pub async fn unregister(&self, id: SessionId) -> Option<Member> {
        self.roster.lock().await.remove(id)
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.roster.lock().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.roster.lock().await.len()
    }

    pub async fn for_each_except(&self, except: SessionId, f: impl FnMut(SessionId, &Member)) {
        self.roster.lock().await.for_each_except(except, f);
    }

    pub async fn for_each_in_room_except(
        &self,
        except: SessionId,
        room: RoomId,
        f: impl FnMut(SessionId, &Member),
    ) {
        self.roster
            .lock()
            .await
            .for_each_in_room_except(except, room, f);
    }

    /// Run `f` with exclusive access to the roster. Multi-step changes that peers must
    /// observe atomically (leave room, switch, arrive) go through here.
    pub async fn with_roster<R>(&self, f: impl FnOnce(&mut Roster) -> R) -> R {
        let mut g = self.roster.lock().await;
        f(&mut g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox;

    fn member(name: &str, room: u32) -> Member {
        let (outbox, _rx) = outbox::channel(4);
        Member {
            name: name.to_string(),
            room: RoomId(room),
            outbox,
        }
    }

    #[test]
    fn ids_are_never_reused() {
        let r = Registry::new();
        let a = r.allocate_id();
        let b = r.allocate_id();
        let c = r.allocate_id();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_unregister_is_idempotent() {
        let r = Registry::new();
        let id = r.allocate_id();
        r.register(id, member("ann", 1)).await.unwrap();
        assert_eq!(
            r.register(id, member("ann2", 1)).await.unwrap_err(),
            RegistryError::DuplicateSession(id)
        );
        assert_eq!(r.len().await, 1);

        assert!(r.unregister(id).await.is_some());
        assert!(r.unregister(id).await.is_none());
        assert!(!r.contains(id).await);
    }

    #[tokio::test]
    async fn iteration_skips_excluded_and_filters_room() {
        let r = Registry::new();
        let (a, b, c) = (r.allocate_id(), r.allocate_id(), r.allocate_id());
        r.register(a, member("ann", 1)).await.unwrap();
        r.register(b, member("bo", 1)).await.unwrap();
        r.register(c, member("cy", 2)).await.unwrap();

        let mut all = Vec::new();
        r.for_each_except(a, |id, _| all.push(id)).await;
        all.sort();
        assert_eq!(all, vec![b, c]);

        let mut room1 = Vec::new();
        r.for_each_in_room_except(a, RoomId(1), |id, _| room1.push(id))
            .await;
        assert_eq!(room1, vec![b]);

        let names = r
            .with_roster(|roster| roster.names_in_room_except(c, RoomId(1)))
            .await;
        assert_eq!(names, vec!["ann".to_string(), "bo".to_string()]);
    }

    #[tokio::test]
    async fn set_room_returns_previous() {
        let r = Registry::new();
        let a = r.allocate_id();
        r.register(a, member("ann", 1)).await.unwrap();
        let old = r.with_roster(|roster| roster.set_room(a, RoomId(2))).await;
        assert_eq!(old, Some(RoomId(1)));
        let missing = r
            .with_roster(|roster| roster.set_room(SessionId(999), RoomId(2)))
            .await;
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn concurrent_register_unregister_keeps_membership_exact() {
        let r = std::sync::Arc::new(Registry::new());
        let mut tasks = Vec::new();
        for i in 0..64u32 {
            let r = r.clone();
            tasks.push(tokio::spawn(async move {
                let id = r.allocate_id();
                r.register(id, member(&format!("p{i}"), i % 3)).await.unwrap();
                if i % 2 == 0 {
                    r.unregister(id).await;
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(r.len().await, 32);
    }
}
