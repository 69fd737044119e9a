//! Broadcast set
//!
//! Registry of the currently open client connections. Each connection is
//! represented by the sending half of its bounded outbound queue; the
//! connection task owns the receiving half and writes frames to the socket.
//!
//! Delivery never blocks: a queue that is closed (the client went away) or
//! full (the client stopped reading) counts as a failed send and evicts the
//! connection. Dropping the sender is what tells the connection task to shut
//! down, so an evicted connection retains no backlog.

use std::collections::BTreeMap;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{ControlError, Result};
use crate::protocol::Frame;

/// Identifier handed out on accept, unique for the lifetime of the hub
pub type ConnectionId = u64;

/// Lifecycle of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Upgrade in progress, not yet in the broadcast set
    Connecting,
    /// Registered and receiving frames
    Open,
    /// Close handshake started
    Closing,
    /// Gone; terminal
    Closed,
}

impl ConnectionPhase {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, next),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closing) | (Open, Closed) | (Closing, Closed)
        )
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: ConnectionPhase) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(ControlError::InvalidTransition(format!(
                "{:?} -> {:?}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }
}

/// One registered connection
#[derive(Debug)]
struct Connection {
    sender: mpsc::Sender<Frame>,
    playing: bool,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the frame was queued for
    pub delivered: usize,
    /// Connections dropped because their queue was closed or full
    pub evicted: Vec<ConnectionId>,
}

/// Which connections a broadcast targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every open connection
    All,
    /// Only connections whose play flag is set
    Playing,
}

/// The set of open connections
#[derive(Debug, Default)]
pub struct ConnectionSet {
    connections: BTreeMap<ConnectionId, Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the set
    pub fn insert(&mut self, id: ConnectionId, sender: mpsc::Sender<Frame>, playing: bool) {
        self.connections.insert(id, Connection { sender, playing });
    }

    /// Remove a connection; returns whether it was present
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of connections with the play flag set
    pub fn playing_count(&self) -> usize {
        self.connections.values().filter(|c| c.playing).count()
    }

    /// Whether at least one connection wants live frames
    pub fn any_playing(&self) -> bool {
        self.connections.values().any(|c| c.playing)
    }

    /// Play flag of a connection
    pub fn is_playing(&self, id: ConnectionId) -> Option<bool> {
        self.connections.get(&id).map(|c| c.playing)
    }

    /// Set the play flag; returns the previous value
    pub fn set_playing(&mut self, id: ConnectionId, playing: bool) -> Option<bool> {
        self.connections
            .get_mut(&id)
            .map(|c| std::mem::replace(&mut c.playing, playing))
    }

    /// Queue a frame for one connection, evicting it on failure.
    ///
    /// Returns `true` when the frame was queued.
    pub fn send_to(&mut self, id: ConnectionId, frame: &Frame) -> bool {
        let Some(connection) = self.connections.get(&id) else {
            return false;
        };
        match connection.sender.try_send(frame.clone()) {
            Ok(()) => true,
            Err(err) => {
                log_failed_send(id, &err);
                self.connections.remove(&id);
                false
            }
        }
    }

    /// Queue a frame for every connection of `audience`.
    ///
    /// A failure on one connection evicts that connection and never stops
    /// delivery to the others.
    pub fn broadcast(&mut self, frame: &Frame, audience: Audience) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for (&id, connection) in &self.connections {
            if audience == Audience::Playing && !connection.playing {
                continue;
            }
            if connection.sender.is_closed() {
                tracing::debug!("Connection {} closed before send", id);
                report.evicted.push(id);
                continue;
            }
            match connection.sender.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    log_failed_send(id, &err);
                    report.evicted.push(id);
                }
            }
        }

        for id in &report.evicted {
            self.connections.remove(id);
        }

        report
    }
}

fn log_failed_send(id: ConnectionId, err: &TrySendError<Frame>) {
    match err {
        TrySendError::Full(_) => {
            tracing::warn!("Connection {} is not keeping up, dropping it", id)
        }
        TrySendError::Closed(_) => tracing::debug!("Connection {} already closed", id),
    }
}
