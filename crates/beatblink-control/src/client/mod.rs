//! WebSocket client with automatic reconnection

pub mod backoff;
pub mod reconnector;

pub use backoff::{ExponentialBackoff, ReconnectPolicy};
pub use reconnector::{
    ClientSnapshot, ConnectionStatus, Reconnector, ReconnectorHandle, CONNECTION_FAILED,
};
