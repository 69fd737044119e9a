//! WebSocket endpoint
//!
//! Each upgraded socket runs one task. It registers with the hub, then
//! forwards inbound text frames to the hub and drains its outbound queue into
//! the socket until either side goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::broadcast::{ConnectionId, ConnectionPhase};
use crate::hub::HubHandle;

use super::server::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

fn advance(phase: &mut ConnectionPhase, next: ConnectionPhase, id: Option<ConnectionId>) {
    if let Err(e) = phase.transition(next) {
        debug!("Connection {:?}: {}", id, e);
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, hub: HubHandle) {
    let mut phase = ConnectionPhase::Connecting;

    let (id, mut outbound) = match hub.connect().await {
        Ok(registered) => registered,
        Err(e) => {
            warn!("Rejecting WebSocket connection: {}", e);
            advance(&mut phase, ConnectionPhase::Closed, None);
            return;
        }
    };
    advance(&mut phase, ConnectionPhase::Open, Some(id));

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sender.send(Message::Text(frame.to_string())).await {
                        debug!("Send to connection {} failed: {}", id, e);
                        break;
                    }
                }
                None => {
                    // Evicted, or the hub shut down
                    advance(&mut phase, ConnectionPhase::Closing, Some(id));
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if hub.message(id, text).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket error on connection {}: {}", id, e);
                    break;
                }
            },
        }
    }

    advance(&mut phase, ConnectionPhase::Closed, Some(id));
    // The hub may already be gone during shutdown
    let _ = hub.close(id).await;
}
