//! Reconnecting client against a live server and a dead port

mod common;

use std::time::Duration;

use beatblink_control::client::CONNECTION_FAILED;
use beatblink_control::{
    ClientMessage, ConnectionStatus, ControlData, HubConfig, ReconnectPolicy, Reconnector,
    StatusPayload,
};
use common::*;
use tokio::net::TcpListener;
use tokio::time::timeout;

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        max_attempts,
        connect_timeout: Duration::from_secs(1),
    }
}

async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
}

#[tokio::test]
async fn test_connects_pings_and_receives_state() {
    let server = start_server(HubConfig::default()).await;
    let client = Reconnector::new(server.ws_url(), fast_policy(10)).spawn();

    let snapshot = timeout(
        RECV_TIMEOUT,
        client.wait_until(|s| {
            s.is_connected() && s.level.is_some() && s.last_status == Some(StatusPayload::pong())
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(snapshot.connections, 1);
    assert!(snapshot.connection_error.is_none());
    assert!(snapshot.audio.is_some());

    client
        .send(&ClientMessage::Control {
            data: ControlData { play: false },
        })
        .unwrap();
    timeout(
        RECV_TIMEOUT,
        client.wait_until(|s| {
            s.last_status
                .as_ref()
                .is_some_and(|status| status.playing == Some(false))
        }),
    )
    .await
    .unwrap()
    .unwrap();

    client.close().await.unwrap();
    wait_for_hub(&server.hub, |s| s.stats.active_connections == 0).await;
    server.stop().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    init_tracing();
    let client = Reconnector::new(dead_url().await, fast_policy(3)).spawn();

    let snapshot = timeout(
        RECV_TIMEOUT,
        client.wait_until(|s| s.status == ConnectionStatus::Failed),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(snapshot.connection_error.as_deref(), Some(CONNECTION_FAILED));
    assert_eq!(snapshot.connections, 0);

    timeout(RECV_TIMEOUT, async {
        while !client.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_retries_do_not_publish_an_error() {
    init_tracing();
    let client = Reconnector::new(dead_url().await, fast_policy(0)).spawn();

    let snapshot = timeout(
        RECV_TIMEOUT,
        client.wait_until(|s| {
            matches!(s.status, ConnectionStatus::Reconnecting { attempt, .. } if attempt >= 3)
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(snapshot.connection_error.is_none());

    if let ConnectionStatus::Reconnecting { delay, .. } = snapshot.status {
        assert!(delay <= Duration::from_millis(40));
    }
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_reconnects_after_server_drops_connection() {
    let server = start_server(HubConfig::default()).await;
    let client = Reconnector::new(server.ws_url(), fast_policy(10)).spawn();

    timeout(RECV_TIMEOUT, client.wait_until(|s| s.is_connected()))
        .await
        .unwrap()
        .unwrap();

    // Without a hub every socket is closed right after the upgrade
    server.hub.shutdown().await.unwrap();

    let snapshot = timeout(RECV_TIMEOUT, client.wait_until(|s| s.connections >= 2))
        .await
        .unwrap()
        .unwrap();
    assert!(snapshot.connection_error.is_none());

    client.close().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_close_cancels_pending_retry() {
    init_tracing();
    let policy = ReconnectPolicy {
        base_delay: Duration::from_secs(60),
        max_delay: Duration::from_secs(60),
        ..fast_policy(10)
    };
    let client = Reconnector::new(dead_url().await, policy).spawn();

    let mut states = client.subscribe();
    timeout(
        RECV_TIMEOUT,
        client.wait_until(|s| matches!(s.status, ConnectionStatus::Reconnecting { .. })),
    )
    .await
    .unwrap()
    .unwrap();

    // Returns long before the 60s delay would have elapsed
    timeout(Duration::from_secs(2), client.close())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(states.borrow_and_update().status, ConnectionStatus::Closed);
}
