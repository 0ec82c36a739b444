pub mod state;
pub mod ws_browser;
pub mod ws_ingest;

pub use state::AppState;

use axum::{Router, routing::get};

/// The bus-port router: emulators dial `/ws` (or `/`) and stream
/// coordinates.
pub fn build_ingest_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_ingest::ws_ingest_handler))
        .route("/ws", get(ws_ingest::ws_ingest_handler))
        .with_state(state)
}

/// The browser-port router: browsers dial `/ws` (or `/`) for viewport
/// updates and fleet snapshots.
pub fn build_browser_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_browser::ws_browser_handler))
        .route("/ws", get(ws_browser::ws_browser_handler))
        .with_state(state)
}
