use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by the realtime core.
///
/// None of these ever crosses a websocket event boundary: the handlers log
/// them and carry on with the next event.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("identity is missing a display name")]
    MissingIdentity,

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("'{identity}' has no write access to document '{document_id}'")]
    AccessDenied { document_id: String, identity: String },

    #[error("document '{0}' not found")]
    NotFound(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("transport error: {0}")]
    Transport(String),
}
