// bus-test-utils: WebSocket test doubles for the relay integration suites.
//
// `MockWsClient` stands in for a browser or an emulator connection against
// the real server.  `CountingWsServer` stands in for the server's ingest
// port when a test needs to observe how the emulator spreads frames across
// its socket pool.

mod counting_ws_server;
mod mock_ws_client;

pub use counting_ws_server::CountingWsServer;
pub use mock_ws_client::MockWsClient;
