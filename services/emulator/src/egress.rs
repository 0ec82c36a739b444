// egress: The outbound socket pool and its supervision loop.
//
// One egress task drains the producers' handoff channel and writes each
// record to one of N websocket connections picked uniformly at random.
// On any transport failure the whole pool is torn down and reopened after
// RELAUNCH_INTERVAL; producers keep blocking on the channel meanwhile.

use std::time::Duration;

use bus_protocol::Bus;
use futures_util::SinkExt;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{info, warn};

/// Delay before reopening the pool after a transport failure.
pub const RELAUNCH_INTERVAL: Duration = Duration::from_secs(1);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection attempt failed: {0}")]
    Connect(String),
    #[error("websocket send failed: {0}")]
    Send(String),
}

/// A fixed-size pool of outbound connections to the relay's ingest port.
#[derive(Debug)]
pub struct EgressPool {
    sockets: Vec<WsStream>,
}

impl EgressPool {
    /// Open `size` connections to `url`.  A handshake failure abandons the
    /// partially opened pool; the sockets already connected close on drop.
    pub async fn connect(url: &str, size: usize) -> Result<Self, TransportError> {
        let mut sockets = Vec::with_capacity(size);
        for _ in 0..size {
            let (ws, _response) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            sockets.push(ws);
        }
        Ok(Self { sockets })
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Send one text frame on a connection picked uniformly at random.
    pub async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.sockets.is_empty() {
            return Err(TransportError::Send("pool has no connections".to_owned()));
        }
        let index = rand::thread_rng().gen_range(0..self.sockets.len());
        self.sockets[index]
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Drain `bus_rx` into a supervised pool until every producer is gone.
pub async fn run_egress(url: String, size: usize, mut bus_rx: Receiver<Bus>) {
    loop {
        let mut pool = match EgressPool::connect(&url, size).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, url = %url, "connection attempt failed");
                sleep(RELAUNCH_INTERVAL).await;
                continue;
            }
        };
        info!(connections = pool.len(), url = %url, "egress pool connected");

        loop {
            let Some(coordinate) = bus_rx.recv().await else {
                return;
            };
            let frame = match serde_json::to_string(&coordinate) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "dropping unserializable coordinate");
                    continue;
                }
            };
            if let Err(e) = pool.send(frame).await {
                warn!(error = %e, "egress connection lost, relaunching pool");
                break;
            }
        }
        sleep(RELAUNCH_INTERVAL).await;
    }
}
