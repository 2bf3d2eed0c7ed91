use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use roommud::{Registry, SessionConfig, World};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const DEFAULT_LOG_FILTER: &str = "info,roommud=info";

fn usage_and_exit() -> ! {
    eprintln!(
        "roommud_server\n\n\
USAGE:\n  roommud_server [--bind HOST:PORT] [--world PATH]\n\n\
ENV:\n  ROOMMUD_BIND               default 127.0.0.1:3000\n  ROOMMUD_WORLD              optional; YAML world file (default: built-in world)\n  ROOMMUD_WRITE_TIMEOUT_MS   optional; default 5000\n  ROOMMUD_OUTBOX_CAP         optional; default 128 (queued messages per client)\n  ROOMMUD_MAX_LINE           optional; default 4096 (bytes)\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    bind: SocketAddr,
    // None runs the built-in world.
    world_path: Option<PathBuf>,
    session: SessionConfig,
}

fn parse_args() -> Config {
    let mut bind: SocketAddr = std::env::var("ROOMMUD_BIND")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());
    let mut world_path = std::env::var("ROOMMUD_WORLD").ok().map(PathBuf::from);

    let mut session = SessionConfig::default();
    session.write_timeout = std::env::var("ROOMMUD_WRITE_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(session.write_timeout);
    session.outbox_capacity = std::env::var("ROOMMUD_OUTBOX_CAP")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(session.outbox_capacity);
    session.max_line_len = std::env::var("ROOMMUD_MAX_LINE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(session.max_line_len);

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--world" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                world_path = Some(PathBuf::from(v));
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        bind,
        world_path,
        session,
    }
}

fn load_world(path: Option<&PathBuf>) -> anyhow::Result<World> {
    let Some(path) = path else {
        return World::default_world().context("built-in world");
    };
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read world file {}", path.display()))?;
    World::from_yaml(&s).with_context(|| format!("load world file {}", path.display()))
}

/// `RUST_LOG` if set, otherwise [`DEFAULT_LOG_FILTER`].
fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .init();

    let cfg = Arc::new(parse_args());

    // Corrupt world data is fatal before we accept anyone.
    let world = Arc::new(load_world(cfg.world_path.as_ref())?);
    let registry = Arc::new(Registry::new());

    let listener = TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;

    info!(
        bind = %cfg.bind,
        world = %cfg.world_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".to_string()),
        rooms = world.len(),
        start_room = %world.start_room(),
        "roommud listening"
    );

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                // Usually fd exhaustion; back off instead of spinning.
                warn!(err = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, err = %e, "set_nodelay failed");
        }
        info!(peer = %peer, "connection accepted");

        let world = world.clone();
        let registry = registry.clone();
        let cfg = cfg.clone();
        tokio::spawn(async move {
            if let Err(e) = roommud::session::serve(stream, world, registry, &cfg.session).await {
                warn!(peer = %peer, err = %e, "connection ended with error");
            }
        });
    }
}
