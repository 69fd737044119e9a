//! End-to-end tests of the `/ws` endpoint over real sockets

mod common;

use std::time::Duration;

use beatblink_control::{HubConfig, ServerMessage, StatusPayload};
use beatblink_core::{AudioFrame, LevelState, SensorReading};
use common::*;
use futures::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

fn sensor(id: &str) -> SensorReading {
    SensorReading {
        sensor_id: id.to_string(),
        sensor_type: "motion".to_string(),
        value: 12.5,
        metadata: None,
        timestamp: 1,
    }
}

#[tokio::test]
async fn test_greeting_on_connect() {
    let server = start_server(paused()).await;
    let mut ws = connect(&server).await;

    match next_message(&mut ws).await {
        ServerMessage::Status { data, .. } => {
            assert_eq!(data.connected, Some(true));
            assert_eq!(data.client_id, Some(1));
            assert_eq!(data.message.as_deref(), Some("Connected to BeatBlink backend"));
        }
        other => panic!("Expected greeting, got {:?}", other),
    }
    match next_message(&mut ws).await {
        ServerMessage::AudioData { data, .. } => assert_eq!(data, AudioFrame::silent(256)),
        other => panic!("Expected zeroed audio, got {:?}", other),
    }
    match next_message(&mut ws).await {
        ServerMessage::LevelState { data, .. } => assert_eq!(data, LevelState::initial()),
        other => panic!("Expected initial level, got {:?}", other),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_ping_gets_one_pong_and_no_broadcast() {
    let server = start_server(paused()).await;
    let mut a = connect_greeted(&server).await;
    let mut b = connect_greeted(&server).await;

    a.send(Message::Text(
        r#"{"type":"ping","timestamp":1523.2999999821186}"#.to_string(),
    ))
        .await
        .unwrap();

    match next_message(&mut a).await {
        ServerMessage::Status { data, .. } => assert_eq!(data, StatusPayload::pong()),
        other => panic!("Expected pong, got {:?}", other),
    }

    // Neither client hears anything else
    assert!(timeout(Duration::from_millis(300), a.next()).await.is_err());
    assert!(timeout(Duration::from_millis(300), b.next()).await.is_err());

    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_survives_a_closed_client() {
    let server = start_server(paused()).await;
    let mut a = connect_greeted(&server).await;
    let mut b = connect_greeted(&server).await;
    let mut c = connect_greeted(&server).await;
    wait_for_hub(&server.hub, |s| s.stats.active_connections == 3).await;

    b.close(None).await.unwrap();
    wait_for_hub(&server.hub, |s| s.stats.active_connections == 2).await;

    server.hub.publish_sensor(sensor("ms-002")).await.unwrap();

    for ws in [&mut a, &mut c] {
        match next_message(ws).await {
            ServerMessage::IotData { data, .. } => assert_eq!(data.sensor_id, "ms-002"),
            other => panic!("Expected iot_data, got {:?}", other),
        }
    }

    let stats = server.hub.snapshot().await.unwrap().stats;
    assert_eq!(stats.total_connections, 3);

    server.stop().await;
}

#[tokio::test]
async fn test_live_frames_reach_every_playing_client() {
    let server = start_server(HubConfig::default()).await;
    let mut a = connect_greeted(&server).await;
    let mut b = connect_greeted(&server).await;

    for ws in [&mut a, &mut b] {
        let level = next_matching(ws, |m| matches!(m, ServerMessage::LevelState { .. })).await;
        if let ServerMessage::LevelState { data, .. } = level {
            assert!((1..=5).contains(&data.current));
            assert!((0.0..1.0).contains(&data.progress));
        }
    }

    // One client leaves, the other keeps streaming
    a.close(None).await.unwrap();
    wait_for_hub(&server.hub, |s| s.stats.active_connections == 1).await;
    next_matching(&mut b, |m| matches!(m, ServerMessage::AudioData { .. })).await;
    assert!(server.hub.snapshot().await.unwrap().stats.generating);

    b.close(None).await.unwrap();
    wait_for_hub(&server.hub, |s| !s.stats.generating).await;

    server.stop().await;
}

#[tokio::test]
async fn test_pause_sends_zeroed_state_and_stops_frames() {
    let server = start_server(HubConfig::default()).await;
    let mut ws = connect_greeted(&server).await;
    next_matching(&mut ws, |m| matches!(m, ServerMessage::AudioData { .. })).await;

    ws.send(Message::Text(
        r#"{"type":"control","data":{"play":false}}"#.to_string(),
    ))
    .await
    .unwrap();

    next_matching(&mut ws, |m| {
        matches!(m, ServerMessage::Status { data, .. } if data.playing == Some(false))
    })
    .await;
    match next_message(&mut ws).await {
        ServerMessage::AudioData { data, .. } => assert_eq!(data.overall_intensity, 0.0),
        other => panic!("Expected zeroed audio, got {:?}", other),
    }
    match next_message(&mut ws).await {
        ServerMessage::LevelState { data, .. } => assert_eq!(data, LevelState::initial()),
        other => panic!("Expected initial level, got {:?}", other),
    }

    assert!(timeout(Duration::from_millis(200), ws.next()).await.is_err());
    assert!(!server.hub.snapshot().await.unwrap().stats.generating);

    server.stop().await;
}

#[tokio::test]
async fn test_configuration_update_reaches_all_clients() {
    let server = start_server(paused()).await;
    let mut a = connect_greeted(&server).await;
    let mut b = connect_greeted(&server).await;

    a.send(Message::Text(
        r#"{"type":"configuration_update","data":{"updateRate":30,"winnerDuration":2000}}"#
            .to_string(),
    ))
    .await
    .unwrap();

    for ws in [&mut a, &mut b] {
        match next_message(ws).await {
            ServerMessage::Configuration { data, .. } => {
                assert_eq!(data.update_rate, 30);
                assert_eq!(data.winner_duration_ms, 2000);
            }
            other => panic!("Expected configuration, got {:?}", other),
        }
    }

    server.stop().await;
}

#[tokio::test]
async fn test_garbage_does_not_drop_the_connection() {
    let server = start_server(paused()).await;
    let mut ws = connect_greeted(&server).await;

    ws.send(Message::Text("definitely not json".to_string()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"warp_speed"}"#.to_string()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();

    match next_message(&mut ws).await {
        ServerMessage::Status { data, .. } => assert_eq!(data.pong, Some(true)),
        other => panic!("Expected pong, got {:?}", other),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_hub_shutdown_closes_sockets() {
    let server = start_server(paused()).await;
    let mut ws = connect_greeted(&server).await;

    server.hub.shutdown().await.unwrap();

    let end = timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok());

    server.stop().await;
}
