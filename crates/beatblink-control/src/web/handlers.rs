//! HTTP request and response bodies

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use beatblink_core::AudioConfiguration;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::hub::HubStats;

/// Error body returned by every failing route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request, rendered as `{"error": ...}` with `status`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a control error, keeping `context` for anything that is not the caller's fault
    pub fn from_control(err: ControlError, context: &str) -> Self {
        match err {
            ControlError::InvalidConfiguration(_) => Self::bad_request(err.to_string()),
            other => {
                tracing::error!("{}: {}", context, other);
                Self::internal(context)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Acknowledgement of `POST /api/audio/stream`
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamAck {
    pub message: String,
    pub timestamp: i64,
}

/// Reply to a successful configuration update
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigUpdated {
    pub message: String,
    pub config: AudioConfiguration,
}

/// Acknowledgement of a sensor push
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAck {
    pub message: String,
    pub sensor_id: String,
    pub timestamp: i64,
}

/// WebSocket server status
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketStatus {
    pub connected: bool,
    pub active_connections: usize,
    pub total_connections: u64,
    pub playing_connections: usize,
}

impl From<&HubStats> for WebSocketStatus {
    fn from(stats: &HubStats) -> Self {
        Self {
            connected: true,
            active_connections: stats.active_connections,
            total_connections: stats.total_connections,
            playing_connections: stats.playing_connections,
        }
    }
}

/// Per-service health
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub audio_processor: String,
    pub websocket_server: String,
}

/// Live counters
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub active_connections: usize,
    pub playing_connections: usize,
    pub iot_sensors: usize,
    pub ticks: u64,
}

/// System status response
#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub system: String,
    pub version: String,
    pub services: ServiceStatus,
    pub metrics: SystemMetrics,
    /// Seconds since the hub started
    pub uptime: f64,
    pub timestamp: i64,
}

impl SystemStatus {
    pub fn from_stats(stats: &HubStats, iot_sensors: usize, timestamp: i64) -> Self {
        let audio = if stats.generating { "running" } else { "idle" };
        Self {
            system: "online".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceStatus {
                audio_processor: audio.to_string(),
                websocket_server: "running".to_string(),
            },
            metrics: SystemMetrics {
                active_connections: stats.active_connections,
                playing_connections: stats.playing_connections,
                iot_sensors,
                ticks: stats.ticks,
            },
            uptime: stats.uptime_secs,
            timestamp,
        }
    }
}
