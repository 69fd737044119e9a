//! IoT sensor readings
//!
//! Sensors push readings over HTTP; the server relays each one to every
//! connected client as an `iot_data` frame. Nothing is stored.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single reading relayed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Sensor identifier (path parameter of the push route)
    pub sensor_id: String,
    /// Sensor kind, `"unknown"` when the device did not say
    pub sensor_type: String,
    /// Measured value
    pub value: f64,
    /// Free-form device metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Unix millis at which the server received the reading
    pub timestamp: i64,
}

/// Body of `POST /api/iot/sensors/:id/data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDataRequest {
    /// Sensor kind reported by the device
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    /// Measured value
    pub value: f64,
    /// Free-form device metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SensorDataRequest {
    /// Turn the request into a reading stamped with `timestamp`
    pub fn into_reading(self, sensor_id: impl Into<String>, timestamp: i64) -> SensorReading {
        SensorReading {
            sensor_id: sensor_id.into(),
            sensor_type: self.sensor_type.unwrap_or_else(|| "unknown".to_string()),
            value: self.value,
            metadata: self.metadata,
            timestamp,
        }
    }
}

/// Last value reported by a sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Measured value
    pub value: f64,
    /// Unix millis of the reading
    pub timestamp: i64,
}

/// Sensor listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInfo {
    /// Sensor identifier
    pub id: String,
    /// Device the sensor is attached to
    pub device_id: String,
    /// Sensor kind
    pub sensor_type: String,
    /// Whether the sensor is currently reporting
    pub is_active: bool,
    /// Most recent reading
    pub last_reading: SensorSample,
}

impl SensorInfo {
    fn simulated(id: &str, sensor_type: &str, value: f64, timestamp: i64) -> Self {
        Self {
            id: id.to_string(),
            device_id: id.to_uppercase(),
            sensor_type: sensor_type.to_string(),
            is_active: true,
            last_reading: SensorSample { value, timestamp },
        }
    }
}

/// The three demo sensors with fresh random readings.
pub fn simulated_sensors(timestamp: i64) -> Vec<SensorInfo> {
    let mut rng = rand::rng();
    vec![
        SensorInfo::simulated(
            "hr-001",
            "heart_rate",
            f64::from(72 + rng.random_range(0..20u32)),
            timestamp,
        ),
        SensorInfo::simulated("ms-002", "motion", rng.random_range(0.0..100.0), timestamp),
        SensorInfo::simulated(
            "sp-003",
            "sound_pressure",
            f64::from(75 + rng.random_range(0..20u32)),
            timestamp,
        ),
    ]
}
