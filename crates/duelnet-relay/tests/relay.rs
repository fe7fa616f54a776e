//! Integration tests for the relay over real loopback WebSockets.

use std::time::Duration;

use duelnet_relay::{Relay, RelayConfig, RelayHandle};
use duelnet_transport::{ClientConnection, Connection, Connector, TransportError, WebSocketConnector};

// =========================================================================
// Helpers
// =========================================================================

fn loopback(port: u16) -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".into(),
        ..RelayConfig::with_port(port)
    }
}

async fn spawn_relay() -> RelayHandle {
    Relay::bind(loopback(0)).await.expect("bind").spawn()
}

async fn join(relay: &RelayHandle) -> ClientConnection {
    WebSocketConnector::default()
        .connect(&format!("127.0.0.1:{}", relay.port()))
        .await
        .expect("connect")
}

async fn wait_for_clients(relay: &RelayHandle, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while relay.client_count() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client count should settle");
}

async fn recv(conn: &ClientConnection) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("frame should arrive")
        .expect("recv")
        .expect("connection open")
}

// =========================================================================
// Forwarding
// =========================================================================

#[tokio::test]
async fn test_frame_reaches_everyone_but_the_sender() {
    let relay = spawn_relay().await;
    let a = join(&relay).await;
    let b = join(&relay).await;
    let c = join(&relay).await;
    wait_for_clients(&relay, 3).await;

    let frame = br#"{"origin":1,"sent_at":0,"body":{"kind":"Attack","payload":{}}}"#;
    a.send(frame).await.unwrap();

    assert_eq!(recv(&b).await, frame);
    assert_eq!(recv(&c).await, frame);

    let echo = tokio::time::timeout(Duration::from_millis(200), a.recv()).await;
    assert!(echo.is_err(), "sender must not receive its own frame");

    relay.shutdown();
}

#[tokio::test]
async fn test_frames_are_forwarded_without_decoding() {
    let relay = spawn_relay().await;
    let a = join(&relay).await;
    let b = join(&relay).await;
    wait_for_clients(&relay, 2).await;

    a.send(b"\x00\x01 not a message").await.unwrap();
    assert_eq!(recv(&b).await, b"\x00\x01 not a message");

    relay.shutdown();
}

#[tokio::test]
async fn test_leaving_client_is_removed() {
    let relay = spawn_relay().await;
    let a = join(&relay).await;
    let b = join(&relay).await;
    wait_for_clients(&relay, 2).await;

    a.close().await.unwrap();
    wait_for_clients(&relay, 1).await;

    // The remaining client can still talk; nobody is left to hear it.
    b.send(b"anyone?").await.unwrap();
    relay.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_client_connections() {
    let relay = spawn_relay().await;
    let a = join(&relay).await;
    wait_for_clients(&relay, 1).await;

    relay.shutdown();
    relay.shutdown();

    let closed = tokio::time::timeout(Duration::from_secs(2), a.recv())
        .await
        .expect("client should see the close");
    assert!(matches!(closed, Ok(None) | Err(_)));
    assert_eq!(relay.client_count(), 0);
}

// =========================================================================
// Port selection
// =========================================================================

#[tokio::test]
async fn test_taken_port_is_skipped() {
    let first = spawn_relay().await;
    let second = Relay::bind(loopback(first.port())).await.expect("scan should succeed");

    assert_ne!(second.port(), first.port());
    assert!(second.port() > first.port());
    first.shutdown();
}

#[tokio::test]
async fn test_exhausted_range_reports_no_free_port() {
    let first = spawn_relay().await;
    let config = RelayConfig {
        port_scan_range: 0,
        ..loopback(first.port())
    };

    match Relay::bind(config).await {
        Err(duelnet_relay::RelayError::Transport(TransportError::NoFreePort { first: lo, .. })) => {
            assert_eq!(lo, first.port());
        }
        Err(other) => panic!("expected NoFreePort, got {other}"),
        Ok(_) => panic!("port should be taken"),
    }
    first.shutdown();
}
