use tracing::{info, warn};

use crate::models::{MentionMessage, SendMessage};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// Handle MentionMessage. Mentions go to every connection, not just the room.
pub async fn handle_mention_message(mention_msg: MentionMessage, connection_id: ConnectionId, state: &AppState) {
    if mention_msg.mentioned_user.trim().is_empty() {
        warn!("Dropping mention from connection {}: nobody mentioned", connection_id);
        return;
    }

    info!("{} mentioned {} in document {}", mention_msg.by, mention_msg.mentioned_user, mention_msg.document_id);
    state
        .router
        .broadcast_all(Some(connection_id), SendMessage::Mention(mention_msg))
        .await;
}
