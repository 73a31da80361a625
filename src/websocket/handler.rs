use std::sync::Arc;
use axum::{
    extract::{Query, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::Identity;
use crate::services::auth_service::identity_from_headers;
use crate::state::AppState;
use crate::websocket::{handle_received_message, msg_leave_handler::handle_disconnect, parse_client_message};

/// Optional identity hints on the socket URL
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// The caller of a socket upgrade
#[derive(Debug, Clone, PartialEq)]
pub enum SocketCaller {
    /// Validated token identity, the client cannot change it
    Verified(Identity),
    /// No secret configured, the URL hints are all there is
    Claimed(Identity),
}

/// Decide who is connecting. With a configured secret a valid token is required.
pub fn authenticate_socket(config: &Config, headers: &HeaderMap, params: ConnectParams) -> Result<SocketCaller, StatusCode> {
    let Some(secret) = &config.auth_jwt_secret else {
        return Ok(SocketCaller::Claimed(Identity::new(params.name.unwrap_or_default(), params.avatar)));
    };
    match identity_from_headers(headers, secret) {
        Ok(identity) => Ok(SocketCaller::Verified(identity)),
        Err(e) => {
            warn!("Rejecting WebSocket upgrade: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("New WebSocket connection attempt");
    let caller = match authenticate_socket(&state.config, &headers, params) {
        Ok(caller) => caller,
        Err(status) => return status.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, caller, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, caller: SocketCaller, state: Arc<AppState>) {

    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    // Every event for this client goes through one queue, which keeps per-origin order
    let (outbound, mut outbound_rx) = mpsc::channel(state.config.outbound_buffer);
    state.router.register_connection(connection_id, outbound).await;
    match caller {
        SocketCaller::Verified(identity) => state.presence.register_verified(connection_id, identity).await,
        SocketCaller::Claimed(identity) => state.presence.register(connection_id, identity).await,
    }

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Drain the outbound queue into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize outbound message for {}: {}", connection_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Listen for incoming messages, one at a time and in order
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
            };

            // A bad frame never tears the connection down
            let received = match parse_client_message(&text) {
                Ok(received) => received,
                Err(e) => {
                    warn!("Dropping frame on connection {}: {}", connection_id, e);
                    continue;
                }
            };
            handle_received_message(received, connection_id, &recv_state).await;
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Same presence cleanup whether or not the client said goodbye
    handle_disconnect(connection_id, &state).await;
    info!("WebSocket connection {} terminated", connection_id);
}
