// bus: Producer tasks for the simulated fleet.

use std::time::Duration;

use bus_protocol::Bus;
use tokio::sync::mpsc::Sender;
use tokio::time::sleep;

/// The out-and-back traversal of a route: the polyline followed by its
/// reverse, treated as cyclic by the producers.
pub fn traversal(coordinates: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut path = coordinates.to_vec();
    path.extend(coordinates.iter().rev());
    path
}

/// `"{route}-{emulator_id}{index:03}"`; two emulators with distinct ids
/// never collide.
pub fn bus_id(route_name: &str, emulator_id: &str, index: usize) -> String {
    format!("{route_name}-{emulator_id}{index:03}")
}

/// Drive one bus along its traversal forever: emit the current position on
/// the shared handoff channel, sleep `refresh_timeout`, advance one step.
///
/// The channel is the backpressure point: when the egress side is slow the
/// send blocks and the bus simply waits.
pub async fn run_bus(
    bus_id: String,
    route_name: String,
    path: Vec<(f64, f64)>,
    start_offset: usize,
    refresh_timeout: Duration,
    bus_tx: Sender<Bus>,
) {
    if path.is_empty() {
        return;
    }
    let mut index = start_offset % path.len();
    loop {
        let (lat, lng) = path[index];
        let coordinate = Bus {
            bus_id: bus_id.clone(),
            lat,
            lng,
            route: route_name.clone(),
        };
        if bus_tx.send(coordinate).await.is_err() {
            // Egress side is gone; the fleet is shutting down.
            break;
        }
        sleep(refresh_timeout).await;
        index = (index + 1) % path.len();
    }
}
