//! REST API route definitions

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use beatblink_core::{
    now_millis, sensor::simulated_sensors, AudioConfiguration, AudioFrame, ConfigurationUpdate,
    LevelState, SensorDataRequest, SensorInfo, SyntheticGenerator,
};

use super::handlers::{
    ApiError, ConfigUpdated, SensorAck, StreamAck, SystemStatus, WebSocketStatus,
};
use super::server::AppState;

/// Build the API router
pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/audio/analyze", get(get_audio_analysis))
        .route("/api/audio/levels", get(get_levels))
        .route("/api/audio/stream", post(post_audio_stream))
        .route("/api/config/audio", get(get_config).post(update_config))
        .route("/api/iot/sensors", get(get_sensors))
        .route("/api/iot/sensors/:id/data", post(post_sensor_data))
        .route("/api/websocket/status", get(get_websocket_status))
}

/// GET /api/audio/analyze - A freshly generated frame
async fn get_audio_analysis(State(state): State<AppState>) -> Result<Json<AudioFrame>, ApiError> {
    let snapshot = state
        .hub
        .snapshot()
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to get audio analysis data"))?;

    let frame = SyntheticGenerator::new().frame_at(now_millis(), &snapshot.configuration);
    Ok(Json(frame))
}

/// GET /api/audio/levels - Current level state
async fn get_levels(State(state): State<AppState>) -> Result<Json<LevelState>, ApiError> {
    let snapshot = state
        .hub
        .snapshot()
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to get level state"))?;
    Ok(Json(snapshot.level))
}

/// POST /api/audio/stream - Accept an uploaded audio chunk
async fn post_audio_stream(body: Bytes) -> Json<StreamAck> {
    tracing::debug!("Audio stream chunk of {} bytes received", body.len());
    Json(StreamAck {
        message: "Audio stream received".to_string(),
        timestamp: now_millis(),
    })
}

/// GET /api/config/audio - Current configuration
async fn get_config(State(state): State<AppState>) -> Result<Json<AudioConfiguration>, ApiError> {
    let snapshot = state
        .hub
        .snapshot()
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to get configuration"))?;
    Ok(Json(snapshot.configuration))
}

/// POST /api/config/audio - Merge an update and broadcast the result
async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigurationUpdate>,
) -> Result<Json<ConfigUpdated>, ApiError> {
    let config = state
        .hub
        .update_configuration(update)
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to update configuration"))?;

    tracing::info!("Audio configuration updated over HTTP");
    Ok(Json(ConfigUpdated {
        message: "Configuration updated successfully".to_string(),
        config,
    }))
}

/// GET /api/iot/sensors - Simulated sensor list
async fn get_sensors() -> Json<Vec<SensorInfo>> {
    Json(simulated_sensors(now_millis()))
}

/// POST /api/iot/sensors/:id/data - Relay a reading to every client
async fn post_sensor_data(
    Path(sensor_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SensorDataRequest>,
) -> Result<Json<SensorAck>, ApiError> {
    if !request.value.is_finite() {
        return Err(ApiError::bad_request("Sensor value must be finite"));
    }

    let timestamp = now_millis();
    tracing::info!("Received IoT data from sensor {}", sensor_id);

    let reading = request.into_reading(sensor_id.clone(), timestamp);
    state
        .hub
        .publish_sensor(reading)
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to process sensor data"))?;

    Ok(Json(SensorAck {
        message: "Sensor data received".to_string(),
        sensor_id,
        timestamp,
    }))
}

/// GET /api/websocket/status - Connection counters
async fn get_websocket_status(
    State(state): State<AppState>,
) -> Result<Json<WebSocketStatus>, ApiError> {
    let snapshot = state
        .hub
        .snapshot()
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to get WebSocket status"))?;
    Ok(Json(WebSocketStatus::from(&snapshot.stats)))
}

/// GET /api/status - System status
async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let snapshot = state
        .hub
        .snapshot()
        .await
        .map_err(|e| ApiError::from_control(e, "Failed to get system status"))?;

    let sensors = simulated_sensors(now_millis()).len();
    Ok(Json(SystemStatus::from_stats(
        &snapshot.stats,
        sensors,
        now_millis(),
    )))
}
