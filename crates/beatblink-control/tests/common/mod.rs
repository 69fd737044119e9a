//! Shared helpers for the server / client integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use beatblink_control::{Hub, HubConfig, HubHandle, ServerMessage, WebServer, WebServerConfig};
use beatblink_core::AudioConfiguration;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A server bound to an ephemeral localhost port
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: HubHandle,
    shutdown: Option<oneshot::Sender<()>>,
    server_task: JoinHandle<beatblink_control::Result<()>>,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.hub.shutdown().await;
        let _ = timeout(RECV_TIMEOUT, &mut self.server_task).await;
    }
}

pub async fn start_server(hub_config: HubConfig) -> TestServer {
    init_tracing();
    let (hub, _hub_task) = Hub::spawn(AudioConfiguration::default(), hub_config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let server = WebServer::new(WebServerConfig::default(), hub.clone());
    let server_task = tokio::spawn(server.serve(listener, async move {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        hub,
        shutdown: Some(tx),
        server_task,
    }
}

pub fn paused() -> HubConfig {
    HubConfig {
        autoplay: false,
        ..Default::default()
    }
}

pub async fn connect(server: &TestServer) -> WsClient {
    let (ws, _) = timeout(RECV_TIMEOUT, connect_async(server.ws_url()))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

/// Next text frame, parsed
pub async fn next_message(ws: &mut WsClient) -> ServerMessage {
    loop {
        let msg = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("invalid server message");
        }
    }
}

/// Skip messages until one matches
pub async fn next_matching<F>(ws: &mut WsClient, mut predicate: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        let message = next_message(ws).await;
        if predicate(&message) {
            return message;
        }
    }
}

/// Connect and consume the greeting (status, zeroed audio, initial level)
pub async fn connect_greeted(server: &TestServer) -> WsClient {
    let mut ws = connect(server).await;
    for _ in 0..3 {
        next_message(&mut ws).await;
    }
    ws
}

/// Poll the hub until `predicate` holds
pub async fn wait_for_hub<F>(hub: &HubHandle, mut predicate: F)
where
    F: FnMut(&beatblink_control::HubSnapshot) -> bool,
{
    timeout(RECV_TIMEOUT, async {
        loop {
            let snapshot = hub.snapshot().await.unwrap();
            if predicate(&snapshot) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("hub never reached the expected state");
}
