// ws_ingest: Read loops for emulator connections on the bus port.
//
// Every text frame is validated as a Bus coordinate.  Valid coordinates
// are fanned out to the sessions; invalid frames earn the sender a
// canonical error document and the connection stays open.  Error documents
// are never forwarded downstream.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bus_protocol::validate::validate_bus;
use tracing::{debug, info};

use crate::state::AppState;

pub async fn ws_ingest_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ingest_socket(socket, state))
}

async fn handle_ingest_socket(mut socket: WebSocket, state: AppState) {
    info!("emulator connected");
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match validate_bus(&text) {
                Ok(bus) => {
                    debug!(bus_id = %bus.bus_id, lat = bus.lat, lng = bus.lng, "coordinate ingested");
                    state.publish(bus);
                }
                Err(e) => {
                    if socket
                        .send(Message::Text(e.document().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            },
            Some(Ok(Message::Ping(data))) => {
                let _ = socket.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(_)) => break,
            Some(Ok(_)) => {}
        }
    }
    info!("emulator disconnected");
}
