use chrono::Utc;
use tracing::{debug, error};

use crate::models::{PongMessage, SendMessage};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// Handle PingMessage - send a pong message back.
pub async fn handle_ping_message(connection_id: ConnectionId, state: &AppState) {
    debug!("Ping message received on connection {}", connection_id);

    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    if !state.router.send_to(connection_id, pong).await {
        error!("Failed to send Pong message to connection {}", connection_id);
    }
}
