//! Auto-reconnecting WebSocket client
//!
//! Keeps one connection to a broadcast server alive. On open it resets the
//! retry counter and sends a `ping`; on close or a failed connect it waits
//! according to the [`ReconnectPolicy`] and tries again until the attempts
//! run out. Everything received is folded into a [`ClientSnapshot`] published
//! through a `watch` channel.

use std::time::Duration;

use beatblink_core::{now_millis, AudioConfiguration, AudioFrame, LevelState, SensorReading};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::backoff::ReconnectPolicy;
use crate::error::{ControlError, Result};
use crate::protocol::{ClientMessage, ServerMessage, StatusPayload};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Published once the retry budget is spent
pub const CONNECTION_FAILED: &str = "Failed to connect after multiple attempts";

/// Queued outbound messages
const OUTBOUND_CAPACITY: usize = 64;

/// Where the client is in its connect / retry cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Waiting `delay` before retry number `attempt`
    Reconnecting { attempt: u32, delay: Duration },
    /// Gave up; no further attempts
    Failed,
    /// Closed by the owner
    Closed,
}

/// Client-side view of the server state
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    pub status: ConnectionStatus,
    /// Terminal error, set only when the retry budget is spent
    pub connection_error: Option<String>,
    pub audio: Option<AudioFrame>,
    pub level: Option<LevelState>,
    pub configuration: Option<AudioConfiguration>,
    pub last_status: Option<StatusPayload>,
    pub last_sensor: Option<SensorReading>,
    pub messages_received: u64,
    /// Successful opens so far
    pub connections: u32,
}

impl ClientSnapshot {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Fold one server frame into the snapshot
    fn apply(&mut self, raw: &str) {
        let message = match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Error parsing WebSocket message: {}", e);
                return;
            }
        };

        self.messages_received += 1;
        match message {
            ServerMessage::AudioData { data, .. } => self.audio = Some(data),
            ServerMessage::LevelState { data, .. } => self.level = Some(data),
            ServerMessage::Configuration { data, .. } => {
                info!("Configuration update: {} Hz", data.update_rate);
                self.configuration = Some(data);
            }
            ServerMessage::IotData { data, .. } => {
                debug!("IoT data received from {}", data.sensor_id);
                self.last_sensor = Some(data);
            }
            ServerMessage::Status { data, .. } => {
                debug!("Status message: {:?}", data);
                self.last_status = Some(data);
            }
        }
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

/// Connects to `url` and keeps reconnecting per `policy`
#[derive(Debug, Clone)]
pub struct Reconnector {
    url: String,
    policy: ReconnectPolicy,
}

impl Reconnector {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection task on the current runtime
    pub fn spawn(self) -> ReconnectorHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ClientSnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(outbound_rx, state_tx, shutdown_rx));

        ReconnectorHandle {
            outbound: outbound_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        self,
        mut outbound: mpsc::Receiver<String>,
        state: watch::Sender<ClientSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut backoff = self.policy.backoff();
        let mut ever_opened = false;

        loop {
            if *shutdown.borrow() {
                break;
            }
            state.send_modify(|s| s.status = ConnectionStatus::Connecting);
            info!("Connecting to WebSocket: {}", self.url);

            let attempt = tokio::select! {
                result = timeout(self.policy.connect_timeout, connect_async(self.url.as_str())) => result,
                _ = shutdown.changed() => break,
            };

            let failure = match attempt {
                Ok(Ok((socket, _response))) => {
                    ever_opened = true;
                    backoff.reset();
                    state.send_modify(|s| {
                        s.status = ConnectionStatus::Connected;
                        s.connection_error = None;
                        s.connections += 1;
                    });
                    info!("WebSocket connected to {}", self.url);

                    match session(socket, &mut outbound, &state, &mut shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Disconnected(reason) => reason,
                    }
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("connect timed out after {:?}", self.policy.connect_timeout),
            };

            if ever_opened {
                warn!("WebSocket disconnected from {}: {}", self.url, failure);
            } else {
                debug!("WebSocket to {} not up yet: {}", self.url, failure);
            }

            let Some(delay) = backoff.next_delay() else {
                error!("{} ({})", CONNECTION_FAILED, self.url);
                state.send_modify(|s| {
                    s.status = ConnectionStatus::Failed;
                    s.connection_error = Some(CONNECTION_FAILED.to_string());
                });
                return;
            };

            let attempt = backoff.attempt();
            state.send_modify(|s| s.status = ConnectionStatus::Reconnecting { attempt, delay });
            debug!("Reconnecting (attempt {}) in {:?}", attempt, delay);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        state.send_modify(|s| s.status = ConnectionStatus::Closed);
        info!("WebSocket client for {} closed", self.url);
    }
}

/// One open connection, until it drops or shutdown is requested
async fn session(
    socket: Socket,
    outbound: &mut mpsc::Receiver<String>,
    state: &watch::Sender<ClientSnapshot>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut source) = socket.split();

    let ping = ClientMessage::Ping {
        timestamp: Some(now_millis() as f64),
    };
    match serde_json::to_string(&ping) {
        Ok(text) => {
            if let Err(e) = sink.send(Message::Text(text)).await {
                return SessionEnd::Disconnected(e.to_string());
            }
        }
        Err(e) => warn!("Failed to serialize ping: {}", e),
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    return SessionEnd::Disconnected(e.to_string());
                }
            }
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => state.send_modify(|s| s.apply(&text)),
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("closed by server ({})", u16::from(f.code)))
                        .unwrap_or_else(|| "closed by server".to_string());
                    return SessionEnd::Disconnected(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                None => return SessionEnd::Disconnected("stream ended".to_string()),
            },
        }
    }
}

/// Owner side of a running [`Reconnector`]
pub struct ReconnectorHandle {
    outbound: mpsc::Sender<String>,
    state: watch::Receiver<ClientSnapshot>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconnectorHandle {
    /// Send a message over the open connection
    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        if !self.state.borrow().is_connected() {
            return Err(ControlError::WebSocketError("not connected".to_string()));
        }
        let text = serde_json::to_string(message)?;
        self.outbound
            .try_send(text)
            .map_err(|e| ControlError::WebSocketError(format!("send failed: {}", e)))
    }

    /// Latest published state
    pub fn snapshot(&self) -> ClientSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ClientSnapshot> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_until<F>(&self, predicate: F) -> Result<ClientSnapshot>
    where
        F: FnMut(&ClientSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| ControlError::WebSocketError("client task ended".to_string()))?;
        Ok(snapshot.clone())
    }

    /// Whether the connection task has ended (closed or gave up)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel any pending retry, close the socket and stop the task
    pub async fn close(self) -> Result<()> {
        // Fails only when the task already gave up
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| ControlError::WebSocketError(format!("client task failed: {}", e)))
    }
}
