use tracing::{debug, warn};

use crate::models::{Identity, SendMessage, UserLeftMessage};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// Handle UserLeftMessage sent by a client navigating away
pub async fn handle_leave_message(leave_msg: UserLeftMessage, connection_id: ConnectionId, state: &AppState) {

    // The client supplied values win, the registry fills the gaps
    let document_id = match leave_msg.document_id.filter(|id| !id.trim().is_empty()) {
        Some(document_id) => Some(document_id),
        None => state.presence.document_of(connection_id).await,
    };
    let Some(document_id) = document_id else {
        warn!("Dropping user-left from connection {}: no document to leave", connection_id);
        return;
    };
    let identity = match state.presence.identity_of(connection_id).await.filter(Identity::has_name) {
        Some(identity) => identity,
        None => leave_msg.identity.filter(Identity::has_name).unwrap_or_default(),
    };

    // Leave the room the connection is really in, whatever the client named
    if let Some(joined) = state.presence.document_of(connection_id).await {
        if joined != document_id {
            state.router.leave_room(connection_id, &joined).await;
        }
    }
    let notice = state.presence.explicit_leave(connection_id, &document_id, identity).await;
    state.router.leave_room(connection_id, &document_id).await;
    let delivered = state
        .router
        .broadcast(&document_id, Some(connection_id), SendMessage::UserLeft(notice))
        .await;
    debug!("user-left for document {} delivered to {} connections", document_id, delivered);
}

/// Transport disconnect, with or without an explicit leave before it
pub async fn handle_disconnect(connection_id: ConnectionId, state: &AppState) {
    if let Some(notice) = state.presence.leave(connection_id).await {
        let document_id = notice.document_id.clone();
        state.router.leave_room(connection_id, &document_id).await;
        state
            .router
            .broadcast(&document_id, Some(connection_id), SendMessage::UserLeft(notice))
            .await;
    }
    state.router.unregister_connection(connection_id).await;
}
