use tracing::{debug, error, info, warn};

use crate::models::{DocumentContentMessage, DocumentUpdateMessage, Identity, SendMessage};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// Handle DocumentUpdateMessage
pub async fn handle_update_message(update_msg: DocumentUpdateMessage, connection_id: ConnectionId, state: &AppState) {

    // Both the target and the payload are required
    let (document_id, content) = match (update_msg.document_id, update_msg.content) {
        (Some(document_id), Some(content)) if !document_id.trim().is_empty() => (document_id, content),
        _ => {
            warn!("Dropping document-update from connection {}: missing documentId or content", connection_id);
            return;
        }
    };

    // Who is writing: the registered identity, the payload only fills the gap
    // on servers that do not verify callers
    let identity = match state.presence.identity_of(connection_id).await.filter(Identity::has_name) {
        Some(identity) => identity,
        None if state.config.auth_jwt_secret.is_some() => {
            warn!("Dropping document-update from unauthenticated connection {}", connection_id);
            return;
        }
        None => update_msg.identity.filter(Identity::has_name).unwrap_or_default(),
    };

    // Check the writer against the page access
    let doc = match state.store.get_by_id(&document_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            warn!("Dropping document-update for unknown document {}", document_id);
            return;
        }
        Err(e) => {
            error!("Failed to load document {} for update: {}", document_id, e);
            return;
        }
    };
    if !doc.can_write(&identity) {
        warn!("Dropping document-update from '{}': no write access to document {}", identity.name, document_id);
        return;
    }

    // Fan the full content out to the rest of the room
    let author = Some(identity.clone()).filter(Identity::has_name);
    let broadcast_msg = SendMessage::DocumentUpdate(DocumentContentMessage {
        document_id: document_id.clone(),
        content: content.clone(),
        identity: author.clone(),
    });
    let delivered = state.router.broadcast(&document_id, Some(connection_id), broadcast_msg).await;
    debug!("document-update for {} delivered to {} connections", document_id, delivered);

    // Persist, last write wins
    if !state.config.persist_on_update {
        return;
    }
    match state.store.replace_content(&document_id, content, author.as_ref()).await {
        Ok(_) => info!("Updated document {}", document_id),
        Err(e) => warn!("Failed to persist update for document {}: {}", document_id, e),
    }
}
