//! Broadcast hub
//!
//! The hub is a single task that owns every piece of shared mutable state:
//! the broadcast set, the level state machine, the audio configuration and
//! the tick timer. Connection tasks and HTTP handlers talk to it through a
//! cloneable [`HubHandle`]; each request becomes a [`HubCommand`] processed
//! in arrival order, so there is exactly one writer.
//!
//! The generation loop only runs while at least one connection has its play
//! flag set. Pausing the last one (or losing the last connection) drops the
//! interval so no further ticks fire.

use std::time::Instant;

use beatblink_core::{
    now_millis, AudioConfiguration, AudioFrame, ConfigurationUpdate, LevelRules, LevelState,
    LevelStateMachine, SensorReading, SyntheticGenerator,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::broadcast::{Audience, ConnectionId, ConnectionSet};
use crate::error::{ControlError, Result};
use crate::protocol::{ClientMessage, Frame, ServerMessage, StatusPayload};

/// Longest slice of an unrecognized message that ends up in the log
const MAX_LOGGED_MESSAGE: usize = 128;

/// Hub settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Play flag of newly accepted connections
    pub autoplay: bool,
    /// Frames buffered per connection before it is considered dead
    pub outbound_capacity: usize,
    /// Pending commands before callers wait
    pub command_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            outbound_capacity: 256,
            command_capacity: 1024,
        }
    }
}

/// Counters reported by the status endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub active_connections: usize,
    pub playing_connections: usize,
    pub total_connections: u64,
    pub ticks: u64,
    pub generating: bool,
    pub uptime_secs: f64,
}

/// Read-only view of the hub state
#[derive(Debug, Clone)]
pub struct HubSnapshot {
    pub configuration: AudioConfiguration,
    pub level: LevelState,
    pub stats: HubStats,
}

/// Requests processed by the hub task
#[derive(Debug)]
pub enum HubCommand {
    /// Register a connection whose outbound queue is `sender`
    Accept {
        sender: mpsc::Sender<Frame>,
        reply: oneshot::Sender<ConnectionId>,
    },
    /// Raw text received from a connection
    Message { id: ConnectionId, raw: String },
    /// Connection closed or failed
    Close { id: ConnectionId },
    /// Shallow-merge a configuration update and broadcast the result
    UpdateConfiguration {
        update: ConfigurationUpdate,
        reply: oneshot::Sender<Result<AudioConfiguration>>,
    },
    /// Relay a sensor reading to every client
    PublishSensor { reading: SensorReading },
    /// Read the current state
    Snapshot { reply: oneshot::Sender<HubSnapshot> },
    /// Stop the hub task
    Shutdown,
}

/// Cloneable entry point to a running hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    outbound_capacity: usize,
}

impl HubHandle {
    async fn send(&self, command: HubCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControlError::HubUnavailable("hub task has stopped".to_string()))
    }

    async fn request<T>(&self, rx: oneshot::Receiver<T>) -> Result<T> {
        rx.await
            .map_err(|_| ControlError::HubUnavailable("hub dropped the reply".to_string()))
    }

    /// Register a new connection with a queue of the configured capacity
    pub async fn connect(&self) -> Result<(ConnectionId, mpsc::Receiver<Frame>)> {
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let id = self.accept(tx).await?;
        Ok((id, rx))
    }

    /// Register a connection; its frames are queued on `sender`
    pub async fn accept(&self, sender: mpsc::Sender<Frame>) -> Result<ConnectionId> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Accept { sender, reply }).await?;
        self.request(rx).await
    }

    /// Hand a raw client message to the hub
    pub async fn message(&self, id: ConnectionId, raw: String) -> Result<()> {
        self.send(HubCommand::Message { id, raw }).await
    }

    /// Remove a connection from the broadcast set
    pub async fn close(&self, id: ConnectionId) -> Result<()> {
        self.send(HubCommand::Close { id }).await
    }

    /// Merge `update` into the shared configuration and broadcast it
    pub async fn update_configuration(
        &self,
        update: ConfigurationUpdate,
    ) -> Result<AudioConfiguration> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::UpdateConfiguration { update, reply })
            .await?;
        self.request(rx).await?
    }

    /// Broadcast a sensor reading
    pub async fn publish_sensor(&self, reading: SensorReading) -> Result<()> {
        self.send(HubCommand::PublishSensor { reading }).await
    }

    /// Current configuration, level state and counters
    pub async fn snapshot(&self) -> Result<HubSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply }).await?;
        self.request(rx).await
    }

    /// Stop the hub; every connection queue is dropped
    pub async fn shutdown(&self) -> Result<()> {
        self.send(HubCommand::Shutdown).await
    }

    /// Whether the hub task is gone
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// The hub task state
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    connections: ConnectionSet,
    level: LevelStateMachine,
    generator: SyntheticGenerator,
    config: AudioConfiguration,
    hub_config: HubConfig,
    ticker: Option<Interval>,
    next_id: ConnectionId,
    total_connections: u64,
    ticks: u64,
    last_frame: Option<AudioFrame>,
    started_at: Instant,
}

impl Hub {
    /// Create a hub owning `level` and `config`, plus the handle to reach it
    pub fn new(
        config: AudioConfiguration,
        level: LevelStateMachine,
        hub_config: HubConfig,
    ) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(hub_config.command_capacity.max(1));
        let handle = HubHandle {
            commands: tx,
            outbound_capacity: hub_config.outbound_capacity.max(1),
        };
        let hub = Self {
            commands: rx,
            connections: ConnectionSet::new(),
            level,
            generator: SyntheticGenerator::new(),
            config,
            hub_config,
            ticker: None,
            next_id: 1,
            total_connections: 0,
            ticks: 0,
            last_frame: None,
            started_at: Instant::now(),
        };
        (hub, handle)
    }

    /// Spawn a hub with fresh level state onto the current runtime
    pub fn spawn(config: AudioConfiguration, hub_config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let level = LevelStateMachine::new(LevelRules::from(&config));
        let (hub, handle) = Self::new(config, level, hub_config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Process commands and ticks until shutdown or until every handle is gone
    pub async fn run(mut self) {
        info!("Broadcast hub started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(HubCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = next_tick(&mut self.ticker) => self.tick(),
            }
        }
        info!(
            "Broadcast hub stopped after {} ticks, dropping {} connections",
            self.ticks,
            self.connections.len()
        );
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Accept { sender, reply } => {
                let id = self.accept(sender);
                if reply.send(id).is_err() {
                    // Caller vanished during the upgrade
                    self.connections.remove(id);
                    self.update_ticker();
                }
            }
            HubCommand::Message { id, raw } => self.on_message(id, &raw),
            HubCommand::Close { id } => self.on_close(id),
            HubCommand::UpdateConfiguration { update, reply } => {
                let result = self.apply_configuration(&update);
                let _ = reply.send(result);
            }
            HubCommand::PublishSensor { reading } => {
                debug!("Relaying reading from sensor {}", reading.sensor_id);
                let message = ServerMessage::IotData {
                    data: reading,
                    timestamp: now_millis(),
                };
                self.broadcast(&message, Audience::All);
            }
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            HubCommand::Shutdown => {}
        }
    }

    fn accept(&mut self, sender: mpsc::Sender<Frame>) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;
        self.total_connections += 1;

        self.connections
            .insert(id, sender, self.hub_config.autoplay);
        info!(
            "WebSocket client connected. Total connections: {}",
            self.connections.len()
        );

        let now = now_millis();
        self.send_to(
            id,
            &ServerMessage::Status {
                data: StatusPayload::connected(id),
                timestamp: now,
            },
        );
        self.send_neutral_state(id, now);
        self.update_ticker();
        id
    }

    fn on_close(&mut self, id: ConnectionId) {
        if self.connections.remove(id) {
            info!(
                "WebSocket client disconnected. Total connections: {}",
                self.connections.len()
            );
        }
        self.update_ticker();
    }

    fn on_message(&mut self, id: ConnectionId, raw: &str) {
        if !self.connections.contains(id) {
            debug!("Ignoring message from unknown connection {}", id);
            return;
        }

        let message = match ClientMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Error parsing message from connection {}: {}", id, e);
                return;
            }
        };

        let now = now_millis();
        match message {
            ClientMessage::Ping { .. } => {
                trace!("Ping from connection {}", id);
                self.send_to(
                    id,
                    &ServerMessage::Status {
                        data: StatusPayload::pong(),
                        timestamp: now,
                    },
                );
            }
            ClientMessage::Control { data } => {
                let was_playing = self.connections.set_playing(id, data.play);
                debug!(
                    "Connection {} play: {:?} -> {}",
                    id, was_playing, data.play
                );
                self.send_to(
                    id,
                    &ServerMessage::Status {
                        data: StatusPayload::playing(data.play),
                        timestamp: now,
                    },
                );
                if !data.play {
                    self.send_neutral_state(id, now);
                }
                self.update_ticker();
            }
            ClientMessage::ConfigurationUpdate { data } => {
                info!("Configuration update received from connection {}", id);
                if let Err(e) = self.apply_configuration(&data) {
                    warn!("Rejected configuration update from {}: {}", id, e);
                    self.send_to(
                        id,
                        &ServerMessage::Status {
                            data: StatusPayload::error(e.to_string()),
                            timestamp: now,
                        },
                    );
                }
            }
            ClientMessage::RequestAudioData => {
                let frame = self
                    .last_frame
                    .clone()
                    .unwrap_or_else(|| self.generator.frame_at(now, &self.config));
                self.send_to(
                    id,
                    &ServerMessage::AudioData {
                        data: frame,
                        timestamp: now,
                    },
                );
                self.send_to(
                    id,
                    &ServerMessage::LevelState {
                        data: self.level.state().clone(),
                        timestamp: now,
                    },
                );
            }
            ClientMessage::Unknown => {
                let excerpt: String = raw.chars().take(MAX_LOGGED_MESSAGE).collect();
                info!("Unknown message type from connection {}: {}", id, excerpt);
            }
        }
    }

    /// One iteration of the generation loop
    fn tick(&mut self) {
        let now = now_millis();
        let frame = self.generator.frame_at(now, &self.config);
        let level = self.level.apply(frame.overall_intensity, now).clone();
        self.ticks += 1;
        trace!(
            "Tick {}: intensity {:.3}, level {}",
            self.ticks,
            frame.overall_intensity,
            level.current
        );

        self.broadcast(
            &ServerMessage::AudioData {
                data: frame.clone(),
                timestamp: now,
            },
            Audience::Playing,
        );
        self.broadcast(
            &ServerMessage::LevelState {
                data: level,
                timestamp: now,
            },
            Audience::Playing,
        );
        self.last_frame = Some(frame);
    }

    fn apply_configuration(&mut self, update: &ConfigurationUpdate) -> Result<AudioConfiguration> {
        let merged = self.config.merged(update)?;
        let rate_changed = merged.update_rate != self.config.update_rate;

        self.config = merged;
        self.level.set_rules(LevelRules::from(&self.config));
        if rate_changed && self.ticker.is_some() {
            self.ticker = Some(new_interval(&self.config));
            info!("Generation loop now running at {} Hz", self.config.update_rate);
        }

        self.broadcast(
            &ServerMessage::Configuration {
                data: self.config.clone(),
                timestamp: now_millis(),
            },
            Audience::All,
        );
        Ok(self.config.clone())
    }

    /// Zeroed frame pair so a client renders a neutral state
    fn send_neutral_state(&mut self, id: ConnectionId, now: i64) {
        self.send_to(
            id,
            &ServerMessage::AudioData {
                data: AudioFrame::silent(self.config.frequency_bins()),
                timestamp: now,
            },
        );
        self.send_to(
            id,
            &ServerMessage::LevelState {
                data: LevelState::initial(),
                timestamp: now,
            },
        );
    }

    fn send_to(&mut self, id: ConnectionId, message: &ServerMessage) {
        match message.to_frame() {
            Ok(frame) => {
                if !self.connections.send_to(id, &frame) {
                    self.update_ticker();
                }
            }
            Err(e) => warn!("Failed to serialize {} message: {}", message.kind(), e),
        }
    }

    fn broadcast(&mut self, message: &ServerMessage, audience: Audience) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize {} message: {}", message.kind(), e);
                return;
            }
        };
        let report = self.connections.broadcast(&frame, audience);
        if !report.evicted.is_empty() {
            info!(
                "Dropped {} dead connections. Total connections: {}",
                report.evicted.len(),
                self.connections.len()
            );
            self.update_ticker();
        }
    }

    /// Start or stop the generation loop to match the play flags
    fn update_ticker(&mut self) {
        let wanted = self.connections.any_playing();
        match (wanted, self.ticker.is_some()) {
            (true, false) => {
                self.ticker = Some(new_interval(&self.config));
                info!("Generation loop started at {} Hz", self.config.update_rate);
            }
            (false, true) => {
                self.ticker = None;
                info!("Generation loop stopped, no playing clients");
            }
            _ => {}
        }
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            configuration: self.config.clone(),
            level: self.level.state().clone(),
            stats: HubStats {
                active_connections: self.connections.len(),
                playing_connections: self.connections.playing_count(),
                total_connections: self.total_connections,
                ticks: self.ticks,
                generating: self.ticker.is_some(),
                uptime_secs: self.started_at.elapsed().as_secs_f64(),
            },
        }
    }
}

fn new_interval(config: &AudioConfiguration) -> Interval {
    let mut interval = tokio::time::interval(config.tick_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
