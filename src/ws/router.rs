use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::models::SendMessage;
use super::ConnectionId;

/// Outbound queue of one connection, drained by its writer task
pub type Outbound = mpsc::Sender<SendMessage>;

struct ConnectionSlot {
    outbound: Outbound,
    room: Option<String>,
}

#[derive(Default)]
struct RouterState {
    connections: HashMap<ConnectionId, ConnectionSlot>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl RouterState {
    fn remove_from_room(&mut self, connection_id: ConnectionId, document_id: &str) {
        if let Some(members) = self.rooms.get_mut(document_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(document_id);
            }
        }
    }
}

/// Groups connections into one broadcast room per document.
///
/// Content is never serialized centrally: the router only fans events out.
/// Each recipient has a single FIFO queue, so events from one origin arrive
/// in the order the origin produced them. Nothing is replayed to a connection
/// that missed events.
#[derive(Default)]
pub struct SessionRouter {
    state: RwLock<RouterState>,
}

impl SessionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_connection(&self, connection_id: ConnectionId, outbound: Outbound) {
        self.state.write().await.connections.insert(
            connection_id,
            ConnectionSlot {
                outbound,
                room: None,
            },
        );
    }

    /// Drop the connection and any room membership it still has
    pub async fn unregister_connection(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        if let Some(slot) = state.connections.remove(&connection_id) {
            if let Some(room) = slot.room {
                state.remove_from_room(connection_id, &room);
            }
        }
    }

    /// Add the connection to the document's room, leaving its previous room.
    pub async fn join_room(&self, connection_id: ConnectionId, document_id: &str) {
        let mut state = self.state.write().await;
        let previous = match state.connections.get_mut(&connection_id) {
            Some(slot) => slot.room.replace(document_id.to_string()),
            None => {
                warn!("join_room for unknown connection {}", connection_id);
                return;
            }
        };
        if let Some(previous) = previous.filter(|room| room != document_id) {
            state.remove_from_room(connection_id, &previous);
        }
        state
            .rooms
            .entry(document_id.to_string())
            .or_default()
            .insert(connection_id);
        debug!("Connection {} joined room {}", connection_id, document_id);
    }

    pub async fn leave_room(&self, connection_id: ConnectionId, document_id: &str) {
        let mut state = self.state.write().await;
        if let Some(slot) = state.connections.get_mut(&connection_id) {
            if slot.room.as_deref() == Some(document_id) {
                slot.room = None;
            }
        }
        state.remove_from_room(connection_id, document_id);
    }

    /// Deliver to every member of the room except `exclude`.
    /// Returns the number of queues that accepted the event.
    pub async fn broadcast(
        &self,
        document_id: &str,
        exclude: Option<ConnectionId>,
        message: SendMessage,
    ) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(document_id) else {
            return 0;
        };
        let targets = members
            .iter()
            .filter(|id| Some(**id) != exclude)
            .filter_map(|id| state.connections.get(id).map(|slot| (*id, slot)));
        deliver(targets, &message)
    }

    /// Deliver to every registered connection except `exclude`, regardless of room
    pub async fn broadcast_all(&self, exclude: Option<ConnectionId>, message: SendMessage) -> usize {
        let state = self.state.read().await;
        let targets = state
            .connections
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, slot)| (*id, slot));
        deliver(targets, &message)
    }

    /// Reply to a single connection
    pub async fn send_to(&self, connection_id: ConnectionId, message: SendMessage) -> bool {
        let state = self.state.read().await;
        let targets = state
            .connections
            .get(&connection_id)
            .map(|slot| (connection_id, slot))
            .into_iter();
        deliver(targets, &message) == 1
    }

    pub async fn room_members(&self, document_id: &str) -> Vec<ConnectionId> {
        self.state
            .read()
            .await
            .rooms
            .get(document_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.connections.clear();
        state.rooms.clear();
    }
}

fn deliver<'a>(
    targets: impl Iterator<Item = (ConnectionId, &'a ConnectionSlot)>,
    message: &SendMessage,
) -> usize {
    let mut delivered = 0;
    for (id, slot) in targets {
        match slot.outbound.try_send(message.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue of connection {} is full, dropping event", id);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} already closed, skipping", id);
            }
        }
    }
    delivered
}
