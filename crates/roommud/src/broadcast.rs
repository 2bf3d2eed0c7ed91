//! Delivery scopes: "everyone but me" and "my room but me".
//!
//! Text is pre-rendered by the caller and framed once; each recipient gets a cheap
//! `Bytes` clone. A recipient that can't take the message is skipped (its kill switch is
//! tripped by [`Outbox::send`](crate::outbox::Outbox::send)) and delivery carries on.

use tracing::warn;

use crate::registry::{Member, Registry, Roster, SessionId};
use crate::world::RoomId;

fn deliver(id: SessionId, m: &Member, msg: &bytes::Bytes, delivered: &mut usize) {
    if m.outbox.send(msg.clone()) {
        *delivered += 1;
    } else {
        warn!(session = %id, "undeliverable peer; marked for disconnect");
    }
}

/// Deliver to every registered session except `except`. Returns the number delivered.
pub fn notify_all(roster: &Roster, except: SessionId, text: &str) -> usize {
    let msg = roomio::text::message(text);
    let mut n = 0;
    roster.for_each_except(except, |id, m| deliver(id, m, &msg, &mut n));
    n
}

/// Deliver to every session in `room` except `except`. Returns the number delivered.
pub fn notify_room(roster: &Roster, except: SessionId, room: RoomId, text: &str) -> usize {
    let msg = roomio::text::message(text);
    let mut n = 0;
    roster.for_each_in_room_except(except, room, |id, m| deliver(id, m, &msg, &mut n));
    n
}

impl Registry {
    pub async fn notify_all(&self, except: SessionId, text: &str) -> usize {
        self.with_roster(|r| notify_all(r, except, text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{self, KillSwitch};
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn join(
        r: &mut Roster,
        id: u64,
        name: &str,
        room: u32,
        cap: usize,
    ) -> (mpsc::Receiver<Bytes>, KillSwitch) {
        let (outbox, rx) = outbox::channel(cap);
        let kill = outbox.kill_switch();
        r.insert(
            SessionId(id),
            Member {
                name: name.to_string(),
                room: RoomId(room),
                outbox,
            },
        )
        .unwrap();
        (rx, kill)
    }

    #[test]
    fn all_but_self() {
        let mut r = Roster::default();
        let (mut a, _) = join(&mut r, 1, "ann", 1, 4);
        let (mut b, _) = join(&mut r, 2, "bo", 1, 4);
        let (mut c, _) = join(&mut r, 3, "cy", 2, 4);

        assert_eq!(notify_all(&r, SessionId(1), "ann: hi"), 2);
        assert!(a.try_recv().is_err());
        assert_eq!(&b.try_recv().unwrap()[..], b"\rann: hi\r\n> ");
        assert_eq!(&c.try_recv().unwrap()[..], b"\rann: hi\r\n> ");
    }

    #[test]
    fn room_but_self() {
        let mut r = Roster::default();
        let (mut a, _) = join(&mut r, 1, "ann", 1, 4);
        let (mut b, _) = join(&mut r, 2, "bo", 1, 4);
        let (mut c, _) = join(&mut r, 3, "cy", 2, 4);

        assert_eq!(notify_room(&r, SessionId(1), RoomId(1), "ann has arrived."), 1);
        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_ok());
        assert!(c.try_recv().is_err());
    }

    #[test]
    fn failed_recipient_does_not_stop_delivery() {
        let mut r = Roster::default();
        // Capacity 1 and pre-filled: the next push overflows.
        let (_stuck_rx, stuck_kill) = join(&mut r, 1, "stuck", 1, 1);
        let (mut ok, ok_kill) = join(&mut r, 2, "ok", 1, 4);
        let (gone_rx, gone_kill) = join(&mut r, 3, "gone", 1, 4);
        drop(gone_rx);
        r.get(SessionId(1)).unwrap().outbox.message("filler");

        assert_eq!(notify_all(&r, SessionId(99), "hello"), 1);
        assert!(ok.try_recv().is_ok());
        assert!(stuck_kill.is_tripped());
        assert!(gone_kill.is_tripped());
        assert!(!ok_kill.is_tripped());
    }
}
