pub mod handler;
pub mod msg_join_handler;
pub mod msg_leave_handler;
pub mod msg_mention_handler;
pub mod msg_ping_handler;
pub mod msg_update_handler;

pub use handler::websocket_handler;

use crate::error::SyncError;
use crate::models::ReceivedMessage;
use crate::state::AppState;
use crate::ws::ConnectionId;

use msg_join_handler::handle_join_message;
use msg_leave_handler::handle_leave_message;
use msg_mention_handler::handle_mention_message;
use msg_ping_handler::handle_ping_message;
use msg_update_handler::handle_update_message;

/// Parse one text frame into a client event
pub fn parse_client_message(text: &str) -> Result<ReceivedMessage, SyncError> {
    serde_json::from_str(text).map_err(|e| SyncError::MalformedMessage(e.to_string()))
}

/// Route one parsed client event to its handler.
///
/// Handlers log their own failures; nothing is returned to the caller.
pub async fn handle_received_message(received: ReceivedMessage, connection_id: ConnectionId, state: &AppState) {
    match received {
        ReceivedMessage::JoinDocument(msg) => handle_join_message(msg, connection_id, state).await,
        ReceivedMessage::DocumentUpdate(msg) => handle_update_message(msg, connection_id, state).await,
        ReceivedMessage::UserLeft(msg) => handle_leave_message(msg, connection_id, state).await,
        ReceivedMessage::Mention(msg) => handle_mention_message(msg, connection_id, state).await,
        ReceivedMessage::Ping(_) => handle_ping_message(connection_id, state).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{
        AccessMode, Document, DocumentUpdateMessage, Identity, JoinDocumentMessage, MentionMessage,
        PingMessage, SendMessage, UserLeftMessage,
    };
    use crate::store::{DocumentStore, MemoryDocumentStore};
    use crate::websocket::msg_leave_handler::handle_disconnect;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn state_with(docs: &[&str]) -> AppState {
        let store = Arc::new(MemoryDocumentStore::new());
        let owner = Identity::named("Owner");
        for id in docs {
            store.create(Document::new(*id, "Page", &owner)).await.unwrap();
        }
        AppState::new(Config::default(), store)
    }

    async fn connect(state: &AppState) -> (ConnectionId, mpsc::Receiver<SendMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(32);
        state.router.register_connection(id, tx).await;
        state.presence.register(id, Identity::default()).await;
        (id, rx)
    }

    async fn join(state: &AppState, conn: ConnectionId, doc: &str, name: &str) {
        let msg = ReceivedMessage::JoinDocument(JoinDocumentMessage {
            document_id: Some(doc.to_string()),
            identity: Some(Identity::named(name)),
        });
        handle_received_message(msg, conn, state).await;
    }

    fn update(doc: &str, content: Value, name: &str) -> ReceivedMessage {
        ReceivedMessage::DocumentUpdate(DocumentUpdateMessage {
            document_id: Some(doc.to_string()),
            content: Some(content),
            identity: Some(Identity::named(name)),
        })
    }

    fn drain(rx: &mut mpsc::Receiver<SendMessage>) -> Vec<SendMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn join_notifies_others_but_not_self() {
        let state = state_with(&["doc1"]).await;
        let (x, mut rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;

        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;

        let seen_by_x = drain(&mut rx_x);
        assert_eq!(seen_by_x.len(), 1);
        assert!(matches!(&seen_by_x[0], SendMessage::UserJoined(p) if p.identity.name == "Bob"));
        assert!(drain(&mut rx_y).is_empty());
    }

    #[tokio::test]
    async fn join_without_name_is_dropped() {
        let state = state_with(&["doc1"]).await;
        let (x, mut rx_x) = connect(&state).await;
        let (y, _rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;

        handle_received_message(
            ReceivedMessage::JoinDocument(JoinDocumentMessage { document_id: Some("doc1".into()), identity: None }),
            y,
            &state,
        )
        .await;

        assert!(drain(&mut rx_x).is_empty());
        assert_eq!(state.router.room_members("doc1").await, vec![x]);
    }

    #[tokio::test]
    async fn update_reaches_room_only_and_is_persisted() {
        let state = state_with(&["docA", "docB"]).await;
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        let (z, mut rx_z) = connect(&state).await;
        join(&state, x, "docA", "Alice").await;
        join(&state, y, "docA", "Bob").await;
        join(&state, z, "docB", "Carol").await;
        drain(&mut rx_y);

        handle_received_message(update("docA", json!({"v": 1}), "Alice"), x, &state).await;

        let seen_by_y = drain(&mut rx_y);
        assert!(matches!(&seen_by_y[..], [SendMessage::DocumentUpdate(m)] if m.content == json!({"v": 1})));
        assert!(drain(&mut rx_z).is_empty());
        let stored = state.store.get_by_id("docA").await.unwrap().unwrap();
        assert_eq!(stored.content, json!({"v": 1}));
        assert!(stored.access_list.iter().any(|g| g.user_name == "Alice"));
    }

    #[tokio::test]
    async fn malformed_update_is_dropped() {
        let state = state_with(&["doc1"]).await;
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;

        let no_content = ReceivedMessage::DocumentUpdate(DocumentUpdateMessage {
            document_id: Some("doc1".into()),
            content: None,
            identity: None,
        });
        handle_received_message(no_content, x, &state).await;

        assert!(drain(&mut rx_y).is_empty());
        assert_eq!(state.store.get_by_id("doc1").await.unwrap().unwrap().content, Document::empty_content());
    }

    #[tokio::test]
    async fn read_only_update_is_neither_broadcast_nor_persisted() {
        let state = state_with(&["doc1"]).await;
        state.store.set_access("doc1", AccessMode::Read).await.unwrap();
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;

        handle_received_message(update("doc1", json!({"v": 1}), "Alice"), x, &state).await;

        assert!(drain(&mut rx_y).is_empty());
        assert_eq!(state.store.get_by_id("doc1").await.unwrap().unwrap().content, Document::empty_content());

        // The author still writes
        let (owner, _rx_owner) = connect(&state).await;
        join(&state, owner, "doc1", "Owner").await;
        drain(&mut rx_y);
        handle_received_message(update("doc1", json!({"v": 2}), "Owner"), owner, &state).await;
        assert_eq!(drain(&mut rx_y).len(), 1);
    }

    #[tokio::test]
    async fn payload_identity_cannot_borrow_the_authors_name() {
        let state = state_with(&["doc1"]).await;
        state.store.set_access("doc1", AccessMode::Read).await.unwrap();
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;

        handle_received_message(update("doc1", json!({"v": 1}), "Owner"), x, &state).await;

        assert!(drain(&mut rx_y).is_empty());
        assert_eq!(state.store.get_by_id("doc1").await.unwrap().unwrap().content, Document::empty_content());
    }

    async fn secured_state() -> AppState {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut doc = Document::new("doc1", "Page", &Identity::named("Owner"));
        doc.access = AccessMode::Read;
        store.create(doc).await.unwrap();
        let config = Config {
            auth_jwt_secret: Some("secret".into()),
            ..Config::default()
        };
        AppState::new(config, store)
    }

    async fn connect_verified(state: &AppState, name: &str) -> (ConnectionId, mpsc::Receiver<SendMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(32);
        state.router.register_connection(id, tx).await;
        state.presence.register_verified(id, Identity::named(name)).await;
        (id, rx)
    }

    #[tokio::test]
    async fn secured_server_ignores_unverified_connections() {
        let state = secured_state().await;
        let (bob, mut rx_bob) = connect_verified(&state, "Bob").await;
        join(&state, bob, "doc1", "Bob").await;
        let (x, _rx_x) = connect(&state).await;

        join(&state, x, "doc1", "Owner").await;
        handle_received_message(update("doc1", json!({"pwned": true}), "Owner"), x, &state).await;

        assert_eq!(state.store.get_by_id("doc1").await.unwrap().unwrap().content, Document::empty_content());
        assert!(drain(&mut rx_bob).is_empty());
        assert_eq!(state.router.room_members("doc1").await, vec![bob]);
    }

    #[tokio::test]
    async fn secured_server_accepts_the_verified_author() {
        let state = secured_state().await;
        let (owner, _rx_owner) = connect_verified(&state, "Owner").await;

        join(&state, owner, "doc1", "Someone else").await;
        handle_received_message(update("doc1", json!({"v": 1}), "Someone else"), owner, &state).await;

        let stored = state.store.get_by_id("doc1").await.unwrap().unwrap();
        assert_eq!(stored.content, json!({"v": 1}));
        assert_eq!(state.presence.viewers("doc1").await, vec![Identity::named("Owner")]);
    }

    #[tokio::test]
    async fn leave_naming_another_document_still_leaves_the_real_room() {
        let state = state_with(&["doc1", "doc2"]).await;
        let (x, mut rx_x) = connect(&state).await;
        let (y, _rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;
        drain(&mut rx_x);

        let leave = ReceivedMessage::UserLeft(UserLeftMessage {
            document_id: Some("doc2".into()),
            identity: Some(Identity::named("Alice")),
        });
        handle_received_message(leave, x, &state).await;

        assert_eq!(state.router.room_members("doc1").await, vec![y]);
        handle_received_message(update("doc1", json!({"v": 1}), "Bob"), y, &state).await;
        assert!(drain(&mut rx_x).is_empty());
    }

    #[tokio::test]
    async fn leave_is_announced_under_the_registered_name() {
        let state = state_with(&["doc1"]).await;
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;
        drain(&mut rx_y);

        let leave = ReceivedMessage::UserLeft(UserLeftMessage {
            document_id: Some("doc1".into()),
            identity: Some(Identity::named("Bob")),
        });
        handle_received_message(leave, x, &state).await;

        let msgs = drain(&mut rx_y);
        assert!(matches!(&msgs[..], [SendMessage::UserLeft(p)] if p.identity.name == "Alice"));
    }

    #[test]
    fn bad_frames_are_malformed_messages() {
        assert!(matches!(parse_client_message("not json"), Err(SyncError::MalformedMessage(_))));
        assert!(matches!(
            parse_client_message(r#"{"event":"teleport","data":{}}"#),
            Err(SyncError::MalformedMessage(_))
        ));
        assert!(matches!(parse_client_message(r#"{"event":"ping","data":{}}"#), Ok(ReceivedMessage::Ping(_))));
    }

    #[tokio::test]
    async fn update_without_identity_uses_the_registry() {
        let state = state_with(&["doc1"]).await;
        let (x, _rx_x) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;

        let anonymous = ReceivedMessage::DocumentUpdate(DocumentUpdateMessage {
            document_id: Some("doc1".into()),
            content: Some(json!({"v": 3})),
            identity: None,
        });
        handle_received_message(anonymous, x, &state).await;

        let stored = state.store.get_by_id("doc1").await.unwrap().unwrap();
        assert!(stored.access_list.iter().any(|g| g.user_name == "Alice"));
    }

    #[tokio::test]
    async fn explicit_leave_then_disconnect_notifies_once() {
        let state = state_with(&["doc1"]).await;
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;

        let leave = ReceivedMessage::UserLeft(UserLeftMessage {
            document_id: Some("doc1".into()),
            identity: Some(Identity::named("Alice")),
        });
        handle_received_message(leave, x, &state).await;
        handle_disconnect(x, &state).await;
        handle_disconnect(x, &state).await;

        let left: Vec<_> = drain(&mut rx_y)
            .into_iter()
            .filter(|m| matches!(m, SendMessage::UserLeft(_)))
            .collect();
        assert_eq!(left.len(), 1);
        assert_eq!(state.router.room_members("doc1").await, vec![y]);
    }

    #[tokio::test]
    async fn disconnect_without_leave_notifies_the_room() {
        let state = state_with(&["doc1"]).await;
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, x, "doc1", "Alice").await;
        join(&state, y, "doc1", "Bob").await;

        handle_disconnect(x, &state).await;

        let msgs = drain(&mut rx_y);
        assert!(matches!(&msgs[..], [SendMessage::UserLeft(p)] if p.identity.name == "Alice" && p.document_id == "doc1"));
        assert_eq!(state.router.connection_count().await, 1);
    }

    #[tokio::test]
    async fn switching_documents_notifies_the_old_room() {
        let state = state_with(&["doc1", "doc2"]).await;
        let (x, _rx_x) = connect(&state).await;
        let (y, mut rx_y) = connect(&state).await;
        join(&state, y, "doc1", "Bob").await;
        join(&state, x, "doc1", "Alice").await;
        drain(&mut rx_y);

        join(&state, x, "doc2", "Alice").await;

        let msgs = drain(&mut rx_y);
        assert!(matches!(&msgs[..], [SendMessage::UserLeft(p)] if p.document_id == "doc1"));
        handle_received_message(update("doc2", json!({"v": 1}), "Alice"), x, &state).await;
        assert!(drain(&mut rx_y).is_empty());
    }

    #[tokio::test]
    async fn mention_goes_to_everyone_else() {
        let state = state_with(&["doc1"]).await;
        let (x, mut rx_x) = connect(&state).await;
        let (_y, mut rx_y) = connect(&state).await;

        let mention = MentionMessage { by: "Alice".into(), mentioned_user: "Bob".into(), document_id: "doc1".into() };
        handle_received_message(ReceivedMessage::Mention(mention.clone()), x, &state).await;

        assert!(drain(&mut rx_x).is_empty());
        assert_eq!(drain(&mut rx_y), vec![SendMessage::Mention(mention)]);
    }

    #[tokio::test]
    async fn ping_answers_the_sender() {
        let state = state_with(&[]).await;
        let (x, mut rx_x) = connect(&state).await;

        handle_received_message(ReceivedMessage::Ping(PingMessage {}), x, &state).await;

        assert!(matches!(&drain(&mut rx_x)[..], [SendMessage::Pong(_)]));
    }
}
