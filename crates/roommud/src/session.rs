//! One task per connection.
//!
//! Connecting (name prompt) → Active (registered, command loop) → Disconnected.
//! Whatever ends the command loop (`quit`, EOF, read error, a tripped kill switch) the
//! session leaves the same way: deregister and tell everyone else, in one registry
//! critical section, then let the writer flush and close the socket.

use std::sync::Arc;

use anyhow::Context;
use roomio::line::LineReader;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broadcast;
use crate::command::Command;
use crate::config::SessionConfig;
use crate::outbox::{self, Outbox};
use crate::error::RegistryError;
use crate::registry::{Member, Registry, SessionId};
use crate::world::{Direction, RoomId, World};

const NAME_PROMPT: &str = "Hi! Please enter your name:";
const NAME_MAX_CHARS: usize = 20;

enum Flow {
    Continue,
    Quit,
}

struct Input<R> {
    lines: LineReader<R>,
    killed: watch::Receiver<bool>,
}

impl<R: AsyncRead + Unpin> Input<R> {
    /// Next input line; `None` once the client is gone or the session was killed.
    async fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        tokio::select! {
            res = self.lines.read_line_lossy() => res.context("read client line"),
            _ = tripped(&mut self.killed) => Ok(None),
        }
    }
}

async fn tripped(killed: &mut watch::Receiver<bool>) {
    // Err means every kill switch handle is gone, which only happens at teardown.
    let _ = killed.wait_for(|k| *k).await;
}

struct Session {
    id: SessionId,
    name: String,
    room: RoomId,
    outbox: Outbox,
    world: Arc<World>,
    registry: Arc<Registry>,
}

/// Run a client connection to completion.
///
/// Returns once the session has been torn down and its writer has flushed (or given up).
pub async fn serve<S>(
    stream: S,
    world: Arc<World>,
    registry: Arc<Registry>,
    cfg: &SessionConfig,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let id = registry.allocate_id();
    let (rd, wr) = tokio::io::split(stream);

    let (outbox, rx) = outbox::channel(cfg.outbox_capacity);
    let kill = outbox.kill_switch();
    let mut input = Input {
        lines: LineReader::new(rd).max_line_len(cfg.max_line_len),
        killed: kill.subscribe(),
    };
    let writer = outbox::spawn_writer(wr, rx, kill, cfg.write_timeout);

    let res = run(id, &mut input, outbox, world, registry).await;

    // The writer exits once the last outbox clone is dropped.
    if tokio::time::timeout(cfg.write_timeout, writer).await.is_err() {
        debug!(session = %id, "writer did not finish in time");
    }
    res
}

async fn run<R: AsyncRead + Unpin>(
    id: SessionId,
    input: &mut Input<R>,
    outbox: Outbox,
    world: Arc<World>,
    registry: Arc<Registry>,
) -> anyhow::Result<()> {
    let Some(name) = handshake(input, &outbox).await? else {
        debug!(session = %id, "disconnected before naming");
        return Ok(());
    };

    let room = world.start_room();
    let Some(start) = world.room(room) else {
        anyhow::bail!("start room {room} missing from world");
    };

    // Registration, banner and first room render share one critical section so no peer
    // message can land between the banner and the room.
    let welcome = format!("Welcome {name}! Type 'quit' to quit.\r\n\r\n");
    registry
        .with_roster(|r| {
            r.insert(
                id,
                Member {
                    name: name.clone(),
                    room,
                    outbox: outbox.clone(),
                },
            )?;
            outbox.message(&welcome);
            outbox.message(&start.render(&r.names_in_room_except(id, room)));
            Ok::<_, RegistryError>(())
        })
        .await?;
    info!(session = %id, name = %name, room = %room, "session active");

    let mut session = Session {
        id,
        name,
        room,
        outbox,
        world,
        registry,
    };
    let res = session.command_loop(input).await;
    session.leave().await;
    res
}

/// Ask for a name until a usable one arrives. `None` if the client leaves first.
async fn handshake<R: AsyncRead + Unpin>(
    input: &mut Input<R>,
    outbox: &Outbox,
) -> anyhow::Result<Option<String>> {
    loop {
        outbox.send(roomio::text::prompt(NAME_PROMPT));
        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        let name = sanitize_name(&line);
        if !name.is_empty() {
            return Ok(Some(name));
        }
    }
}

fn sanitize_name(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(NAME_MAX_CHARS)
        .collect()
}

impl Session {
    async fn command_loop<R: AsyncRead + Unpin>(
        &mut self,
        input: &mut Input<R>,
    ) -> anyhow::Result<()> {
        while let Some(line) = input.next_line().await? {
            let Some(cmd) = Command::parse(&line) else {
                continue;
            };
            if let Flow::Quit = self.dispatch(cmd).await {
                break;
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Quit => {
                self.outbox.message("Goodbye!");
                return Flow::Quit;
            }
            Command::Chat(msg) => self.chat(&msg).await,
            Command::Look(keyword) => self.look(keyword.as_deref()).await,
            Command::Move(dir) => self.move_to(dir).await,
            Command::Unknown(token) => {
                self.outbox
                    .message(&format!("Sorry, {token} isn't a valid command."));
            }
        }
        Flow::Continue
    }

    async fn chat(&self, msg: &str) {
        self.outbox.message(&format!("You: {msg}"));
        let n = self
            .registry
            .notify_all(self.id, &format!("{}: {msg}", self.name))
            .await;
        debug!(session = %self.id, len = msg.len(), recipients = n, "chat");
    }

    async fn look(&self, keyword: Option<&str>) {
        let Some(room) = self.world.room(self.room) else {
            warn!(session = %self.id, room = %self.room, "session in unknown room");
            return;
        };

        let text = match keyword {
            None => {
                let (id, here) = (self.id, self.room);
                let occupants = self
                    .registry
                    .with_roster(|r| r.names_in_room_except(id, here))
                    .await;
                room.render(&occupants)
            }
            Some(k) => match room.extra(k) {
                Some(t) => t.to_string(),
                None => format!("There is nothing by the name of '{k}' to look at here."),
            },
        };
        self.outbox.message(&text);
    }

    /// Follow the exit in `dir`, if any. No exit means no change and no output.
    async fn move_to(&mut self, dir: Direction) {
        let from = self.room;
        let Some(to) = self.world.room(from).and_then(|r| r.exit(dir)) else {
            return;
        };
        if to == from {
            return;
        }
        let Some(dest) = self.world.room(to) else {
            warn!(session = %self.id, room = %to, "exit to unknown room");
            return;
        };

        // Peers must never see the arrival before the switch, so the whole move happens
        // under one lock: departure notice, room switch, arrival notice, new room render.
        let (id, name, outbox) = (self.id, self.name.as_str(), &self.outbox);
        self.registry
            .with_roster(|r| {
                broadcast::notify_room(r, id, from, &format!("{name} left to the {dir}."));
                r.set_room(id, to);
                broadcast::notify_room(r, id, to, &format!("{name} has arrived."));
                outbox.message(&dest.render(&r.names_in_room_except(id, to)));
            })
            .await;
        self.room = to;
        debug!(session = %id, from = %from, to = %to, "moved");
    }

    async fn leave(&self) {
        let (id, name) = (self.id, self.name.as_str());
        let notified = self
            .registry
            .with_roster(|r| {
                r.remove(id);
                broadcast::notify_all(r, id, &format!("{name} has logged off."))
            })
            .await;
        info!(session = %id, name = %name, notified, "session ended");
    }
}
