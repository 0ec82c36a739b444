// ws_browser: Browser sessions on the client port.
//
// Each accepted socket becomes one session: a listener task applying
// viewport updates and a publisher task filtering the ingest fan-out
// through that viewport.  The two tasks share the viewport behind a lock
// and the socket's write half behind a mutex; when either half ends the
// sibling is cancelled and the session state drops with the socket.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bus_protocol::{Bus, FleetSnapshot, WindowBounds, validate::validate_bounds};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::state::AppState;

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

pub async fn ws_browser_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_browser_socket(socket, state))
}

async fn handle_browser_socket(socket: WebSocket, state: AppState) {
    info!("browser connected");

    // Subscribe before the session loops start so no update is missed.
    let bus_rx = state.subscribe();
    let (sink, stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));
    let bounds = Arc::new(RwLock::new(WindowBounds::default()));

    let mut listener = tokio::spawn(listen_browser(stream, sink.clone(), bounds.clone()));
    let mut publisher = tokio::spawn(send_buses(sink, bounds, bus_rx, state));

    // Peer gone on either half cancels the sibling.
    tokio::select! {
        _ = &mut listener => publisher.abort(),
        _ = &mut publisher => listener.abort(),
    }
    info!("browser session ended");
}

/// Apply `newBounds` frames to the shared viewport.  Invalid frames earn
/// an error document and leave the viewport unchanged.
async fn listen_browser(
    mut stream: SplitStream<WebSocket>,
    sink: SharedSink,
    bounds: Arc<RwLock<WindowBounds>>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match validate_bounds(&text) {
                Ok(frame) => {
                    debug!(?frame, "viewport updated");
                    bounds.write().await.update(frame);
                }
                Err(e) => {
                    if sink
                        .lock()
                        .await
                        .send(Message::Text(e.document().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            },
            Ok(Message::Ping(data)) => {
                let _ = sink.lock().await.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Drain the ingest fan-out through the session's viewport and push
/// throttled fleet snapshots.
async fn send_buses(
    sink: SharedSink,
    bounds: Arc<RwLock<WindowBounds>>,
    mut bus_rx: broadcast::Receiver<Bus>,
    state: AppState,
) {
    let mut last_sent: Option<Instant> = None;
    loop {
        let bus = match bus_rx.recv().await {
            Ok(bus) => bus,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Session is too slow; drop its backlog and keep going.
                debug!(skipped, "session lagging behind ingest");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let window = *bounds.read().await;
        if window.is_none() {
            continue;
        }
        if !window.is_inside(bus.lat, bus.lng) {
            // Lazy expunge: the bus left the window, forget it.
            state.remove_bus(&bus.bus_id).await;
            continue;
        }
        state.upsert_bus(bus).await;

        if let Some(last) = last_sent {
            if last.elapsed() < state.refresh_timeout {
                // Throttled; the next qualifying event carries fresher state.
                continue;
            }
        }
        let buses = state
            .snapshot()
            .await
            .into_iter()
            .filter(|bus| window.is_inside(bus.lat, bus.lng))
            .collect();
        let snapshot = FleetSnapshot::new(buses);
        let Ok(json) = serde_json::to_string(&snapshot) else {
            continue;
        };
        if sink.lock().await.send(Message::Text(json.into())).await.is_err() {
            break;
        }
        last_sent = Some(Instant::now());
    }
}
