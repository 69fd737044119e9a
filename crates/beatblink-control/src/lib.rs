//! Beat & Blink Control - Real-time State Broadcast
//!
//! This crate fans the generated audio / level state out to every connected
//! client:
//! - **Hub**: single-task owner of the connection set, level state machine,
//!   configuration and tick timer
//! - **Broadcast set**: non-blocking fan-out with eviction of dead connections
//! - **Web API**: REST routes and the `/ws` WebSocket endpoint
//! - **Client**: WebSocket client with exponential-backoff reconnection
//!
//! ## Feature Flags
//!
//! - `http-api`: Enable the web server (requires `axum`, `tower-http`)
//! - `client`: Enable the reconnecting client (requires `tokio-tungstenite`)
//! - `full`: Enable all features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beatblink_control::{Hub, HubConfig};
//! use beatblink_core::AudioConfiguration;
//!
//! # async fn run() -> beatblink_control::Result<()> {
//! let (hub, _task) = Hub::spawn(AudioConfiguration::default(), HubConfig::default());
//! let (id, mut frames) = hub.connect().await?;
//! while let Some(frame) = frames.recv().await {
//!     println!("{id}: {frame}");
//! }
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

/// Error types
pub mod error;
/// WebSocket message types
pub mod protocol;
/// Set of open connections
pub mod broadcast;
/// The broadcast hub task
pub mod hub;

#[cfg(feature = "http-api")]
/// Web API server
pub mod web;

#[cfg(feature = "client")]
/// Reconnecting WebSocket client
pub mod client;

// Re-exports
pub use broadcast::{Audience, ConnectionId, ConnectionPhase, ConnectionSet, DeliveryReport};
pub use error::{ControlError, Result};
pub use hub::{Hub, HubConfig, HubHandle, HubSnapshot, HubStats};
pub use protocol::{ClientMessage, ControlData, Frame, ServerMessage, StatusPayload};

#[cfg(feature = "http-api")]
pub use web::{WebServer, WebServerConfig};

#[cfg(feature = "client")]
pub use client::{ClientSnapshot, ConnectionStatus, ReconnectPolicy, Reconnector, ReconnectorHandle};
