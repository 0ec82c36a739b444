// state: Process-wide server state shared by every connection.
//
// The fleet map is the only shared mutable state: the latest valid
// coordinate per bus id, last-writer-wins.  Ingested coordinates reach the
// sessions through one broadcast channel; a lagging session drops its own
// backlog (RecvError::Lagged) instead of back-pressuring ingest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bus_protocol::Bus;
use tokio::sync::{RwLock, broadcast};

/// Capacity of the ingest->session fan-out channel, per subscriber.
const FANOUT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    fleet: Arc<RwLock<HashMap<String, Bus>>>,
    bus_tx: broadcast::Sender<Bus>,
    /// Minimum interval between snapshots to one session.
    pub refresh_timeout: Duration,
}

impl AppState {
    pub fn new(refresh_timeout: Duration) -> Self {
        let (bus_tx, _rx) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            fleet: Arc::new(RwLock::new(HashMap::new())),
            bus_tx,
            refresh_timeout,
        }
    }

    /// Fan an ingested coordinate out to every active session.  A send with
    /// no subscribers is not an error; the coordinate is simply dropped.
    pub fn publish(&self, bus: Bus) {
        let _ = self.bus_tx.send(bus);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bus> {
        self.bus_tx.subscribe()
    }

    /// Last-writer-wins upsert.
    pub async fn upsert_bus(&self, bus: Bus) {
        self.fleet.write().await.insert(bus.bus_id.clone(), bus);
    }

    /// Lazy expunge: a session that sees a bus leave its viewport removes
    /// the entry so stale ghosts don't accumulate.
    pub async fn remove_bus(&self, bus_id: &str) {
        self.fleet.write().await.remove(bus_id);
    }

    /// The current fleet, in unspecified order.
    pub async fn snapshot(&self) -> Vec<Bus> {
        self.fleet.read().await.values().cloned().collect()
    }

    pub async fn fleet_len(&self) -> usize {
        self.fleet.read().await.len()
    }
}
