//! Statistical check of the egress pool's uniform random load spreading.

use std::time::Duration;

use bus_test_utils::CountingWsServer;
use emulator::egress::EgressPool;

#[tokio::test]
async fn frames_spread_evenly_across_the_pool() {
    let server = CountingWsServer::start().await.unwrap();
    let sockets = 5usize;
    let frames = 2000usize;

    let mut pool = EgressPool::connect(&server.url(), sockets).await.unwrap();
    for n in 0..frames {
        let frame = format!(r#"{{"busId": "120-{n:03}", "lat": 55.75, "lng": 37.62, "route": "120"}}"#);
        pool.send(frame).await.unwrap();
    }

    // Wait until the mock server has read everything off the wire.
    tokio::time::timeout(Duration::from_secs(10), async {
        while server.total_frames() < frames {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("mock server should receive every frame");

    let counts = server.frame_counts();
    assert_eq!(counts.len(), sockets);
    assert_eq!(counts.iter().sum::<usize>(), frames);

    // Uniform pick over 5 sockets and 2000 frames: mean 400, sigma ~18.
    // A +/-50% band is many sigmas wide; failures mean the pick is not
    // uniform, not bad luck.
    let mean = frames / sockets;
    for (socket, &count) in counts.iter().enumerate() {
        assert!(
            count > mean / 2 && count < mean * 3 / 2,
            "socket {socket} carried {count} of {frames} frames: {counts:?}"
        );
    }
}

#[tokio::test]
async fn pool_drains_producers_and_winds_down_cleanly() {
    let server = CountingWsServer::start().await.unwrap();
    let (bus_tx, bus_rx) = tokio::sync::mpsc::channel(1);
    let egress = tokio::spawn(emulator::egress::run_egress(server.url(), 3, bus_rx));

    let producer = tokio::spawn(emulator::bus::run_bus(
        "120-000".to_owned(),
        "120".to_owned(),
        vec![(55.74, 37.60), (55.75, 37.62), (55.76, 37.64)],
        0,
        Duration::from_millis(5),
        bus_tx,
    ));

    tokio::time::timeout(Duration::from_secs(10), async {
        while server.total_frames() < 30 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("frames should flow through the pool");

    producer.abort();
    let _ = producer.await;
    tokio::time::timeout(Duration::from_secs(2), egress)
        .await
        .expect("egress should end once the producer is gone")
        .unwrap();
}
