//! Web API and WebSocket server
//!
//! - `GET /ws`: WebSocket stream of audio, level, sensor and status frames
//! - `/api/audio/*`, `/api/config/audio`, `/api/iot/*`: REST collaborators
//! - `/api/status`, `/api/websocket/status`: counters

pub mod handlers;
pub mod routes;
pub mod server;
pub mod websocket;

pub use handlers::{ApiError, ErrorResponse};
pub use routes::build_router;
pub use server::{AppState, WebServer, WebServerConfig};
