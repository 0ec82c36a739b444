//! Browser-session behaviour: viewport gating, filtering, lazy expunge,
//! throttling, and slow-session isolation.

use std::net::SocketAddr;
use std::time::Duration;

use bus_test_utils::MockWsClient;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

async fn start_server(refresh_timeout: Duration) -> (String, String) {
    let state = server::AppState::new(refresh_timeout);

    let ingest_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ingest listener");
    let ingest_addr: SocketAddr = ingest_listener.local_addr().unwrap();
    tokio::spawn({
        let router = server::build_ingest_router(state.clone());
        async move {
            axum::serve(ingest_listener, router).await.expect("ingest listener error");
        }
    });

    let browser_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind browser listener");
    let browser_addr: SocketAddr = browser_listener.local_addr().unwrap();
    tokio::spawn({
        let router = server::build_browser_router(state);
        async move {
            axum::serve(browser_listener, router).await.expect("browser listener error");
        }
    });

    (
        format!("ws://{ingest_addr}/ws"),
        format!("ws://{browser_addr}/ws"),
    )
}

fn coordinate_frame(bus_id: &str, lat: f64, lng: f64) -> String {
    format!(r#"{{"busId": "{bus_id}", "lat": {lat}, "lng": {lng}, "route": "120"}}"#)
}

const COVERING_BOUNDS: &str = r#"{"msgType": "newBounds", "data": {"south_lat": 55.0, "north_lat": 56.0, "west_lng": 37.0, "east_lng": 38.0}}"#;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_snapshot_until_a_valid_viewport_is_set() {
    let (ingest_url, browser_url) = start_server(Duration::ZERO).await;

    let mut browser = MockWsClient::connect(&browser_url).await.unwrap();
    let mut feed = MockWsClient::connect(&ingest_url).await.unwrap();

    feed.send_text(&coordinate_frame("120-000", 55.75, 37.62))
        .await
        .unwrap();
    assert!(
        browser
            .recv_text_timeout(Duration::from_millis(300))
            .await
            .is_none(),
        "viewport is unset, nothing should be pushed"
    );

    browser.send_text(COVERING_BOUNDS).await.unwrap();
    settle().await;
    feed.send_text(&coordinate_frame("120-000", 55.76, 37.63))
        .await
        .unwrap();
    let snapshot = browser.recv_snapshot().await.unwrap();
    assert_eq!(snapshot.buses.len(), 1);
    assert_eq!(snapshot.buses[0].lat, 55.76);
}

#[tokio::test]
async fn invalid_bounds_frame_leaves_the_viewport_unchanged() {
    let (ingest_url, browser_url) = start_server(Duration::ZERO).await;

    let mut browser = MockWsClient::connect(&browser_url).await.unwrap();
    browser
        .send_text(r#"{"msgType": 185, "data": {"south_lat": 55.0, "north_lat": 56.0, "west_lng": 37.0, "east_lng": 38.0}}"#)
        .await
        .unwrap();
    let document = browser.recv_json().await.unwrap();
    assert_eq!(document["msgType"], "Errors");
    assert_eq!(
        document["errors"][0],
        "Тип сообщения должен быть строкой \"newBounds\"."
    );

    // The rejected frame set nothing: coordinates still don't flow.
    let mut feed = MockWsClient::connect(&ingest_url).await.unwrap();
    feed.send_text(&coordinate_frame("120-000", 55.75, 37.62))
        .await
        .unwrap();
    assert!(
        browser
            .recv_text_timeout(Duration::from_millis(300))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn out_of_viewport_buses_are_filtered_and_expunged() {
    let (ingest_url, browser_url) = start_server(Duration::ZERO).await;

    let mut browser = MockWsClient::connect(&browser_url).await.unwrap();
    browser.send_text(COVERING_BOUNDS).await.unwrap();
    settle().await;

    let mut feed = MockWsClient::connect(&ingest_url).await.unwrap();

    // Inside the window: appears.
    feed.send_text(&coordinate_frame("120-000", 55.75, 37.62))
        .await
        .unwrap();
    let snapshot = browser.recv_snapshot().await.unwrap();
    assert_eq!(snapshot.buses.len(), 1);

    // The bus leaves the window: dropped and expunged, no frame pushed.
    feed.send_text(&coordinate_frame("120-000", 60.0, 37.62))
        .await
        .unwrap();
    assert!(
        browser
            .recv_text_timeout(Duration::from_millis(300))
            .await
            .is_none()
    );

    // Another bus comes inside: its snapshot no longer carries the ghost.
    feed.send_text(&coordinate_frame("14-000", 55.70, 37.50))
        .await
        .unwrap();
    let snapshot = browser.recv_snapshot().await.unwrap();
    assert_eq!(snapshot.buses.len(), 1);
    assert_eq!(snapshot.buses[0].bus_id, "14-000");
}

#[tokio::test]
async fn snapshots_are_throttled_by_refresh_timeout() {
    let refresh = Duration::from_millis(300);
    let (ingest_url, browser_url) = start_server(refresh).await;

    let mut browser = MockWsClient::connect(&browser_url).await.unwrap();
    browser.send_text(COVERING_BOUNDS).await.unwrap();
    settle().await;

    let mut feed = MockWsClient::connect(&ingest_url).await.unwrap();
    let feeder = tokio::spawn(async move {
        for n in 0..200 {
            let lat = 55.5 + f64::from(n) * 0.001;
            if feed
                .send_text(&coordinate_frame("120-000", lat, 37.62))
                .await
                .is_err()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let _first = browser.recv_snapshot().await.unwrap();
    let first_at = Instant::now();
    let _second = browser.recv_snapshot().await.unwrap();
    let second_at = Instant::now();
    let _third = browser.recv_snapshot().await.unwrap();
    let third_at = Instant::now();

    // Receipt times carry a little transport jitter on top of the server's
    // monotonic throttle; allow a small slack.
    let floor = refresh - Duration::from_millis(50);
    assert!(
        second_at - first_at >= floor,
        "snapshots arrived {:?} apart",
        second_at - first_at
    );
    assert!(third_at - second_at >= floor);

    feeder.abort();
    let _ = feeder.await;
}

#[tokio::test]
async fn repeated_bounds_are_idempotent() {
    let (ingest_url, browser_url) = start_server(Duration::ZERO).await;

    let mut browser = MockWsClient::connect(&browser_url).await.unwrap();
    browser.send_text(COVERING_BOUNDS).await.unwrap();
    browser.send_text(COVERING_BOUNDS).await.unwrap();
    settle().await;

    let mut feed = MockWsClient::connect(&ingest_url).await.unwrap();
    feed.send_text(&coordinate_frame("120-000", 55.75, 37.62))
        .await
        .unwrap();
    let snapshot = browser.recv_snapshot().await.unwrap();
    assert_eq!(snapshot.buses.len(), 1);
}

#[tokio::test]
async fn a_slow_session_does_not_stall_the_others() {
    let (ingest_url, browser_url) = start_server(Duration::ZERO).await;

    // The slow browser sets a viewport and then never reads.
    let mut slow = MockWsClient::connect(&browser_url).await.unwrap();
    slow.send_text(COVERING_BOUNDS).await.unwrap();

    let mut fast = MockWsClient::connect(&browser_url).await.unwrap();
    fast.send_text(COVERING_BOUNDS).await.unwrap();
    settle().await;

    let mut feed = MockWsClient::connect(&ingest_url).await.unwrap();
    for n in 0..100 {
        let lat = 55.5 + f64::from(n) * 0.001;
        feed.send_text(&coordinate_frame("120-000", lat, 37.62))
            .await
            .unwrap();
    }

    // The fast session keeps receiving fresh snapshots regardless.
    let mut last_lat = 0.0;
    for _ in 0..5 {
        let snapshot = browser_snapshot(&mut fast).await;
        last_lat = snapshot.buses[0].lat;
    }
    assert!(last_lat > 55.5);
}

async fn browser_snapshot(browser: &mut MockWsClient) -> bus_protocol::FleetSnapshot {
    tokio::time::timeout(Duration::from_secs(2), browser.recv_snapshot())
        .await
        .expect("snapshot should arrive")
        .expect("snapshot should parse")
}
