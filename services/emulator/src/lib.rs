// emulator: Streams simulated bus coordinates to the relay server.
//
// Pipeline: route corpus -> one producer task per bus -> capacity-1 handoff
// channel -> supervised pool of outbound websockets.

pub mod bus;
pub mod egress;
pub mod routes;

pub use egress::RELAUNCH_INTERVAL;
pub use routes::{CorpusError, ROUTES_DIR, Route};

use std::path::PathBuf;
use std::time::Duration;

use bus_protocol::Bus;
use futures_util::{StreamExt, pin_mut};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct EmulatorConfig {
    /// WebSocket URL of the relay's ingest port.
    pub server_url: String,
    pub routes_dir: PathBuf,
    /// How many routes to take from the corpus.
    pub routes_number: usize,
    /// Upper bound (exclusive) on the random bus count per route.
    pub buses_per_route: usize,
    /// Size of the egress pool.
    pub websockets_number: usize,
    /// Namespaces bus ids so several emulators can feed one relay.
    pub emulator_id: String,
    /// Producer cadence.
    pub refresh_timeout: Duration,
}

/// Spawn the fleet and run the egress pool until the egress ends (all
/// producers gone) or the operator interrupts.  Producer tasks are torn
/// down before returning.
pub async fn run(config: EmulatorConfig) -> Result<(), CorpusError> {
    let (bus_tx, bus_rx) = mpsc::channel::<Bus>(1);

    let producers = spawn_producers(&config, bus_tx).await?;
    info!(buses = producers.len(), "fleet spawned");

    let mut egress = tokio::spawn(egress::run_egress(
        config.server_url.clone(),
        config.websockets_number,
        bus_rx,
    ));

    tokio::select! {
        _ = shutdown_signal() => info!("interrupt received, shutting down"),
        _ = &mut egress => {}
    }

    egress.abort();
    for producer in &producers {
        producer.abort();
    }
    Ok(())
}

/// Walk the corpus and spawn a random number of buses per route, each with
/// a private cyclic cursor starting at a random offset.  Skippable corpus
/// errors are logged and skipped; an unreadable directory aborts startup.
async fn spawn_producers(
    config: &EmulatorConfig,
    bus_tx: mpsc::Sender<Bus>,
) -> Result<Vec<JoinHandle<()>>, CorpusError> {
    let stream = routes::load_routes(&config.routes_dir);
    pin_mut!(stream);

    let mut producers = Vec::new();
    let mut taken = 0usize;
    while taken < config.routes_number {
        let Some(item) = stream.next().await else {
            break;
        };
        let route = match item {
            Ok(route) => route,
            Err(e) if e.is_skippable() => {
                warn!(error = %e, "skipping route descriptor");
                continue;
            }
            Err(e) => return Err(e),
        };
        taken += 1;

        let path = bus::traversal(&route.coordinates);
        let buses = if config.buses_per_route > 1 {
            rand::thread_rng().gen_range(1..config.buses_per_route)
        } else {
            1
        };
        for index in 0..buses {
            let start_offset = rand::thread_rng().gen_range(0..path.len());
            producers.push(tokio::spawn(bus::run_bus(
                bus::bus_id(&route.name, &config.emulator_id, index),
                route.name.clone(),
                path.clone(),
                start_offset,
                config.refresh_timeout,
                bus_tx.clone(),
            )));
        }
    }
    Ok(producers)
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger teardown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
