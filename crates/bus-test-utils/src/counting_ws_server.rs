// counting_ws_server: A mock ingest endpoint that counts frames per
// connection.
//
// The emulator spreads frames across its socket pool by uniform random
// pick; tests assert the per-connection counts instead of inspecting the
// pool.  Connections are indexed in accept order.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;

/// A mock WebSocket server for integration testing.
///
/// Binds to port 0 (random) and exposes the actual bound address.  Each
/// test can spin up its own isolated instance.  Every received text frame
/// increments the counter of the connection that carried it.
pub struct CountingWsServer {
    addr: SocketAddr,
    counts: Arc<Mutex<Vec<usize>>>,
    drop_tx: watch::Sender<u64>,
    /// Handle to the background accept loop; dropped with the server.
    _task: tokio::task::JoinHandle<()>,
}

impl CountingWsServer {
    /// Start the mock server, binding to a random available port.
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let counts = Arc::new(Mutex::new(Vec::new()));
        let (drop_tx, drop_rx) = watch::channel(0u64);

        let task = tokio::spawn(Self::accept_loop(listener, counts.clone(), drop_rx));

        Ok(Self {
            addr,
            counts,
            drop_tx,
            _task: task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Frames received so far, one entry per accepted connection in accept
    /// order.
    pub fn frame_counts(&self) -> Vec<usize> {
        self.counts.lock().expect("counts lock poisoned").clone()
    }

    pub fn total_frames(&self) -> usize {
        self.frame_counts().iter().sum()
    }

    pub fn connection_count(&self) -> usize {
        self.frame_counts().len()
    }

    /// Close every currently open connection.  New connections are still
    /// accepted, so reconnecting clients get a fresh set of slots.
    pub fn drop_connections(&self) {
        self.drop_tx.send_modify(|generation| *generation += 1);
    }

    // -- internal --

    async fn accept_loop(
        listener: TcpListener,
        counts: Arc<Mutex<Vec<usize>>>,
        drop_rx: watch::Receiver<u64>,
    ) {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let slot = {
                        let mut counts = counts.lock().expect("counts lock poisoned");
                        counts.push(0);
                        counts.len() - 1
                    };
                    let counts = counts.clone();
                    let drop_rx = drop_rx.clone();
                    tokio::spawn(async move {
                        let _ = Self::handle_connection(stream, slot, counts, drop_rx).await;
                    });
                }
                Err(_) => break,
            }
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        slot: usize,
        counts: Arc<Mutex<Vec<usize>>>,
        mut drop_rx: watch::Receiver<u64>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut ws_stream = tokio_tungstenite::accept_async(stream).await?;
        // Connections accepted after an earlier drop must not see the stale
        // generation bump.
        drop_rx.borrow_and_update();
        loop {
            tokio::select! {
                msg = ws_stream.next() => match msg {
                    Some(Ok(Message::Text(_))) => {
                        counts.lock().expect("counts lock poisoned")[slot] += 1;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_stream.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                },
                changed = drop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let _ = ws_stream.close(None).await;
                    break;
                }
            }
        }
        Ok(())
    }
}
