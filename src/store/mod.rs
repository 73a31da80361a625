use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{AccessMode, Document, DocumentVersion, Identity};

pub mod cached;
pub mod memory;
pub mod postgres;

pub use cached::CachedDocumentStore;
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document '{0}' not found")]
    NotFound(String),

    #[error("document '{0}' already exists")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Persistence collaborator holding the authoritative page content and the
/// append-only version log.
///
/// Content writes are whole-payload replacements. Whoever writes last wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used in logs and readiness output
    fn kind(&self) -> &'static str;

    async fn create(&self, doc: Document) -> Result<Document, StoreError>;

    async fn get_by_id(&self, document_id: &str) -> Result<Option<Document>, StoreError>;

    /// Replace the content and record the editor in the access list
    async fn replace_content(
        &self,
        document_id: &str,
        content: Value,
        editor: Option<&Identity>,
    ) -> Result<Document, StoreError>;

    async fn set_access(&self, document_id: &str, access: AccessMode) -> Result<Document, StoreError>;

    async fn append_version(
        &self,
        document_id: &str,
        content: Value,
        editor: &Identity,
    ) -> Result<DocumentVersion, StoreError>;

    /// Versions in insertion order
    async fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>, StoreError>;
}
