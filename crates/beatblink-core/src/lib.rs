//! Beat & Blink Core - Domain Model and State Transitions
//!
//! This crate contains the core domain model for Beat & Blink, including:
//! - Synthetic audio feature frames and their generator
//! - The level / progress / winner state machine
//! - Shared audio configuration with shallow-merge updates
//! - IoT sensor readings relayed to clients
//! - Logging configuration

#![warn(missing_docs)]

use thiserror::Error;

pub mod config;
pub mod frame;
pub mod generator;
pub mod level;
pub mod logging;
pub mod sensor;

// Re-exports
pub use config::{AudioConfiguration, ConfigurationUpdate};
pub use frame::AudioFrame;
pub use generator::SyntheticGenerator;
pub use level::{LevelRules, LevelState, LevelStateMachine, MAX_LEVEL, MIN_LEVEL};
pub use logging::LogConfig;
pub use sensor::{SensorDataRequest, SensorInfo, SensorReading, SensorSample};

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// A configuration value is out of its accepted range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Unknown log level string
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// I/O error (log directory handling)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
