use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::store::DocumentStore;
use crate::ws::{PresenceRegistry, SessionRouter};

/// Everything the handlers share. Built once per server process.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub presence: PresenceRegistry,
    pub router: SessionRouter,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            store,
            presence: PresenceRegistry::new(),
            router: SessionRouter::new(),
        }
    }

    /// Tear down realtime state on shutdown
    pub async fn shutdown(&self) {
        info!(
            "Shutting down realtime state: {} connections, {} rooms",
            self.router.connection_count().await,
            self.router.room_count().await
        );
        self.presence.clear().await;
        self.router.clear().await;
    }
}
