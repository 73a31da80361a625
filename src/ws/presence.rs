use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::models::{Identity, PresenceMessage};
use super::ConnectionId;

#[derive(Clone, Debug)]
struct PresenceEntry {
    identity: Identity,
    document_id: Option<String>,
    /// Identity was taken from a validated token and cannot be replaced
    verified: bool,
}

/// Result of a successful join
#[derive(Clone, Debug, PartialEq)]
pub struct JoinOutcome {
    /// `user-joined` notice for the joined document's room
    pub joined: PresenceMessage,
    /// `user-left` notice for the document the connection was in before, if
    /// it switched documents
    pub left: Option<PresenceMessage>,
}

/// Tracks which identity is viewing which document, keyed by connection.
///
/// One registry is owned per server process and torn down on shutdown.
#[derive(Default)]
pub struct PresenceRegistry {
    sessions: RwLock<HashMap<ConnectionId, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookkeeping on transport connect. The identity may still be anonymous.
    pub async fn register(&self, connection_id: ConnectionId, identity: Identity) {
        self.insert(connection_id, identity, false).await;
    }

    /// Bookkeeping on connect when the identity provider vouched for the caller
    pub async fn register_verified(&self, connection_id: ConnectionId, identity: Identity) {
        self.insert(connection_id, identity, true).await;
    }

    async fn insert(&self, connection_id: ConnectionId, identity: Identity, verified: bool) {
        self.sessions.write().await.insert(
            connection_id,
            PresenceEntry {
                identity,
                document_id: None,
                verified,
            },
        );
        debug!("Registered connection {} (verified: {})", connection_id, verified);
    }

    /// Record that the connection views `document_id`.
    ///
    /// A connection already joined to another document leaves it first, and
    /// the returned outcome carries the `user-left` notice for that room.
    /// A verified connection keeps its registered identity whatever the
    /// client claims.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        identity: Identity,
        document_id: &str,
    ) -> Result<JoinOutcome, SyncError> {
        let mut sessions = self.sessions.write().await;
        let (identity, verified) = match sessions.get(&connection_id) {
            Some(entry) if entry.verified => (entry.identity.clone(), true),
            _ => (identity, false),
        };
        if !identity.has_name() {
            warn!("join-document on connection {} without a user name", connection_id);
            return Err(SyncError::MissingIdentity);
        }

        let previous = sessions.insert(
            connection_id,
            PresenceEntry {
                identity: identity.clone(),
                document_id: Some(document_id.to_string()),
                verified,
            },
        );
        drop(sessions);

        let left = previous.and_then(|entry| match entry.document_id {
            Some(prev_doc) if prev_doc != document_id => Some(PresenceMessage {
                document_id: prev_doc,
                identity: entry.identity,
            }),
            _ => None,
        });

        info!("{} joined document {}", identity.name, document_id);
        Ok(JoinOutcome {
            joined: PresenceMessage {
                document_id: document_id.to_string(),
                identity,
            },
            left,
        })
    }

    /// Disconnect path: forget the connection.
    ///
    /// Returns the `user-left` notice when the connection was joined to a
    /// document. Calling it again is a no-op.
    pub async fn leave(&self, connection_id: ConnectionId) -> Option<PresenceMessage> {
        let entry = self.sessions.write().await.remove(&connection_id)?;
        let document_id = entry.document_id?;
        info!("{} disconnected from document {}", entry.identity.name, document_id);
        Some(PresenceMessage {
            document_id,
            identity: entry.identity,
        })
    }

    /// Client initiated leave.
    ///
    /// Trusts the client supplied document and identity over whatever the
    /// registry holds, and always produces a notice. The connection stays
    /// registered so that a following disconnect emits nothing more.
    pub async fn explicit_leave(
        &self,
        connection_id: ConnectionId,
        document_id: &str,
        identity: Identity,
    ) -> PresenceMessage {
        if let Some(entry) = self.sessions.write().await.get_mut(&connection_id) {
            entry.document_id = None;
        }
        info!("{} left document {}", identity.name, document_id);
        PresenceMessage {
            document_id: document_id.to_string(),
            identity,
        }
    }

    pub async fn identity_of(&self, connection_id: ConnectionId) -> Option<Identity> {
        self.sessions
            .read()
            .await
            .get(&connection_id)
            .map(|entry| entry.identity.clone())
    }

    pub async fn is_verified(&self, connection_id: ConnectionId) -> bool {
        self.sessions
            .read()
            .await
            .get(&connection_id)
            .map(|entry| entry.verified)
            .unwrap_or(false)
    }

    pub async fn document_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(&connection_id)
            .and_then(|entry| entry.document_id.clone())
    }

    /// Identities currently joined to a document
    pub async fn viewers(&self, document_id: &str) -> Vec<Identity> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.document_id.as_deref() == Some(document_id))
            .map(|entry| entry.identity.clone())
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn present_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.document_id.is_some())
            .count()
    }

    pub async fn clear(&self) {
        let mut sessions = self.sessions.write().await;
        info!("Clearing presence registry ({} connections)", sessions.len());
        sessions.clear();
    }
}
