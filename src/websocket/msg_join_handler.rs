use tracing::{debug, warn};

use crate::models::{JoinDocumentMessage, SendMessage};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// Handle JoinDocumentMessage
pub async fn handle_join_message(join_msg: JoinDocumentMessage, connection_id: ConnectionId, state: &AppState) {

    // A join without a document has nowhere to go
    let document_id = match join_msg.document_id.filter(|id| !id.trim().is_empty()) {
        Some(document_id) => document_id,
        None => {
            warn!("Dropping join-document from connection {}: missing documentId", connection_id);
            return;
        }
    };

    // A secured server only lets verified connections in
    if state.config.auth_jwt_secret.is_some() && !state.presence.is_verified(connection_id).await {
        warn!("Dropping join-document from unauthenticated connection {}", connection_id);
        return;
    }

    // Register presence, this fails when the identity has no name
    let identity = join_msg.identity.unwrap_or_default();
    let outcome = match state.presence.join(connection_id, identity, &document_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Dropping join-document from connection {}: {}", connection_id, e);
            return;
        }
    };

    // Switching documents: tell the old room we are gone
    if let Some(left) = outcome.left {
        let previous = left.document_id.clone();
        state.router.leave_room(connection_id, &previous).await;
        state.router.broadcast(&previous, Some(connection_id), SendMessage::UserLeft(left)).await;
    }

    // Join the room and notify the others in it
    state.router.join_room(connection_id, &document_id).await;
    let delivered = state
        .router
        .broadcast(&document_id, Some(connection_id), SendMessage::UserJoined(outcome.joined))
        .await;
    debug!("user-joined for document {} delivered to {} connections", document_id, delivered);
}
