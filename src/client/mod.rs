//! Client side of the realtime core.
//!
//! A [`SyncSession`] keeps one local copy of a page roughly in step with
//! everyone else editing it. The policy is last-writer-wins with typing
//! suppression: remote snapshots never interrupt a user who is typing, local
//! edits go out in full on every change, and a debounced autosave persists
//! the final state of each burst. A polling task re-fetches the page so a
//! client whose socket dropped still converges.

pub mod autosave;
pub mod engine;
pub mod identity;
pub mod poller;
pub mod remote;
pub mod session;

use serde::Deserialize;
use std::time::Duration;

use crate::models::{Identity, MentionMessage};

pub use autosave::AutosaveScheduler;
pub use engine::{ConvergenceEngine, EditCapability, PollTicket, RemoteDecision, RemoteSource};
pub use identity::{IdentityProvider, StaticIdentity};
pub use poller::{spawn_poller, PollHandle};
pub use remote::{ContentPersister, DocumentSource, HttpPageClient, StoreBridge};
pub use session::SyncSession;

/// User visible, non-fatal notifications
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved { document_id: String },
    SaveFailed { document_id: String, reason: String },
    AccessDenied { document_id: String },
    NotFound { document_id: String },
}

/// What the session reports to the editing surface
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    UserJoined(Identity),
    UserLeft(Identity),
    Mention(MentionMessage),
    /// A remote snapshot replaced the local content
    RemoteApplied,
    /// The realtime channel is gone, polling keeps running
    Disconnected,
}

/// Client timing and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SyncOptions {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token of the identity provider, if the server wants one
    pub api_token: Option<String>,

    /// Inactivity after which the user no longer counts as typing
    #[serde(default = "default_typing_idle_ms")]
    pub typing_idle_ms: u64,

    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl SyncOptions {
    /// Read `SYNC_*` variables, e.g. `SYNC_WS_URL`
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("SYNC_").from_env::<SyncOptions>()
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_base_url: default_api_base_url(),
            api_token: None,
            typing_idle_ms: default_typing_idle_ms(),
            autosave_delay_ms: default_autosave_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_typing_idle_ms() -> u64 {
    1_000
}

fn default_autosave_delay_ms() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}
