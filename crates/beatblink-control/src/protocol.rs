//! WebSocket wire protocol
//!
//! Every message is a JSON object tagged by its `type` field. Server frames
//! carry their payload in `data` plus a unix-millis `timestamp`.

use std::sync::Arc;

use beatblink_core::{AudioConfiguration, AudioFrame, ConfigurationUpdate, LevelState, SensorReading};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// A serialized server message, shared between all recipients of a broadcast
pub type Frame = Arc<str>;

/// Message from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AudioData { data: AudioFrame, timestamp: i64 },
    LevelState { data: LevelState, timestamp: i64 },
    IotData { data: SensorReading, timestamp: i64 },
    Configuration { data: AudioConfiguration, timestamp: i64 },
    Status { data: StatusPayload, timestamp: i64 },
}

impl ServerMessage {
    /// Serialize once into a shareable frame
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::AudioData { .. } => "audio_data",
            ServerMessage::LevelState { .. } => "level_state",
            ServerMessage::IotData { .. } => "iot_data",
            ServerMessage::Configuration { .. } => "configuration",
            ServerMessage::Status { .. } => "status",
        }
    }

    /// Frames that only playing connections receive
    pub fn is_live_audio(&self) -> bool {
        matches!(
            self,
            ServerMessage::AudioData { .. } | ServerMessage::LevelState { .. }
        )
    }
}

/// Payload of `status` messages. Only the relevant fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pong: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusPayload {
    /// Greeting sent right after a connection is accepted
    pub fn connected(client_id: u64) -> Self {
        Self {
            connected: Some(true),
            client_id: Some(client_id),
            message: Some("Connected to BeatBlink backend".to_string()),
            ..Default::default()
        }
    }

    /// Reply to `ping`
    pub fn pong() -> Self {
        Self {
            pong: Some(true),
            ..Default::default()
        }
    }

    /// Acknowledgement of a play/pause control message
    pub fn playing(playing: bool) -> Self {
        Self {
            playing: Some(playing),
            ..Default::default()
        }
    }

    /// Rejection of a client request
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Message from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping {
        /// Client clock in millis, possibly fractional (`performance.now()`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
    Control {
        data: ControlData,
    },
    ConfigurationUpdate {
        data: ConfigurationUpdate,
    },
    RequestAudioData,
    /// Any tag this server does not know
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ControlError::InvalidMessage(e.to_string()))
    }
}

/// Body of a `control` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlData {
    pub play: bool,
}
