//! Per-connection write side.
//!
//! Nobody writes to a client socket directly. Messages go into a bounded queue that a
//! dedicated writer task drains, so a slow or stuck client only ever stalls its own
//! writer. Any delivery fault (queue full, queue closed, write error, write timeout)
//! trips the session's kill switch; the session's read loop observes it and runs the
//! normal disconnect path.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct KillSwitch(Arc<watch::Sender<bool>>);

impl KillSwitch {
    pub fn trip(&self) {
        self.0.send_replace(true);
    }

    pub fn is_tripped(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Bytes>,
    kill: KillSwitch,
}

/// Create an outbox and the receiving end its writer task drains.
pub fn channel(capacity: usize) -> (Outbox, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (kill_tx, _) = watch::channel(false);
    let outbox = Outbox {
        tx,
        kill: KillSwitch(Arc::new(kill_tx)),
    };
    (outbox, rx)
}

impl Outbox {
    /// Queue raw bytes without waiting. Returns false (and trips the kill switch) when
    /// the recipient can't keep up or is already gone.
    pub fn send(&self, b: Bytes) -> bool {
        match self.tx.try_send(b) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("outbox full; disconnecting slow client");
                self.kill.trip();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.kill.trip();
                false
            }
        }
    }

    /// Queue `text` framed as a message followed by the prompt marker.
    pub fn message(&self, text: &str) -> bool {
        self.send(roomio::text::message(text))
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }
}

/// Drain `rx` into `wr` until every [`Outbox`] clone is dropped or a write fails.
pub fn spawn_writer<W>(
    mut wr: W,
    mut rx: mpsc::Receiver<Bytes>,
    kill: KillSwitch,
    write_timeout: Duration,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(b) = rx.recv().await {
            match tokio::time::timeout(write_timeout, wr.write_all(&b[..])).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(err = %e, "client write failed");
                    kill.trip();
                    break;
                }
                Err(_) => {
                    warn!(timeout_ms = write_timeout.as_millis() as u64, "client write timed out");
                    kill.trip();
                    break;
                }
            }
        }
        let _ = tokio::time::timeout(write_timeout, wr.shutdown()).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writer_drains_in_order_and_closes() {
        let (client, server) = tokio::io::duplex(256);
        let (outbox, rx) = channel(8);
        let writer = spawn_writer(server, rx, outbox.kill_switch(), Duration::from_secs(1));

        assert!(outbox.message("one"));
        assert!(outbox.send(Bytes::from_static(b"two")));
        drop(outbox);
        writer.await.unwrap();

        let mut client = client;
        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"\rone\r\n> two");
    }

    #[tokio::test]
    async fn full_queue_trips_kill_switch() {
        let (outbox, _rx) = channel(1);
        let kill = outbox.kill_switch();
        assert!(outbox.message("a"));
        assert!(!kill.is_tripped());
        assert!(!outbox.message("b"));
        assert!(kill.is_tripped());
    }

    #[tokio::test]
    async fn closed_queue_trips_kill_switch() {
        let (outbox, rx) = channel(4);
        drop(rx);
        assert!(!outbox.message("a"));
        assert!(outbox.kill_switch().is_tripped());
    }

    #[tokio::test]
    async fn stuck_client_times_out() {
        // Client never reads; the duplex buffer fills and the write stalls.
        let (_client, server) = tokio::io::duplex(4);
        let (outbox, rx) = channel(4);
        let kill = outbox.kill_switch();
        let mut killed = kill.subscribe();
        let _writer = spawn_writer(server, rx, kill, Duration::from_millis(50));

        assert!(outbox.message("this does not fit in four bytes"));
        tokio::time::timeout(Duration::from_secs(2), killed.wait_for(|k| *k))
            .await
            .unwrap()
            .unwrap();
    }
}
