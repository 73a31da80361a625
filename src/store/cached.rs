use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{DocumentStore, StoreError};
use crate::models::{AccessMode, Document, DocumentVersion, Identity};

/// Read-through cache in front of another store.
///
/// Writes go to the inner store first and then refresh the cached entry, so a
/// single server process always reads its own last write. Entries are evicted
/// after a period of inactivity.
pub struct CachedDocumentStore {
    inner: Arc<dyn DocumentStore>,
    cache: Cache<String, Document>,
}

impl CachedDocumentStore {
    pub fn new(inner: Arc<dyn DocumentStore>, time_to_idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_idle(time_to_idle)
            .build();
        info!("Document cache initialized ({}s idle timeout)", time_to_idle.as_secs());
        Self { inner, cache }
    }

    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl DocumentStore for CachedDocumentStore {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    async fn create(&self, doc: Document) -> Result<Document, StoreError> {
        let doc = self.inner.create(doc).await?;
        self.cache.insert(doc.id.clone(), doc.clone()).await;
        Ok(doc)
    }

    async fn get_by_id(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        if let Some(doc) = self.cache.get(document_id).await {
            return Ok(Some(doc));
        }

        debug!("Document cache miss for {}", document_id);
        let doc = self.inner.get_by_id(document_id).await?;
        if let Some(ref doc) = doc {
            self.cache.insert(document_id.to_string(), doc.clone()).await;
        }
        Ok(doc)
    }

    async fn replace_content(
        &self,
        document_id: &str,
        content: Value,
        editor: Option<&Identity>,
    ) -> Result<Document, StoreError> {
        match self.inner.replace_content(document_id, content, editor).await {
            Ok(doc) => {
                self.cache.insert(document_id.to_string(), doc.clone()).await;
                Ok(doc)
            }
            Err(e) => {
                // The cached copy can no longer be trusted
                self.cache.invalidate(document_id).await;
                Err(e)
            }
        }
    }

    async fn set_access(&self, document_id: &str, access: AccessMode) -> Result<Document, StoreError> {
        let doc = self.inner.set_access(document_id, access).await?;
        self.cache.insert(document_id.to_string(), doc.clone()).await;
        Ok(doc)
    }

    async fn append_version(
        &self,
        document_id: &str,
        content: Value,
        editor: &Identity,
    ) -> Result<DocumentVersion, StoreError> {
        self.inner.append_version(document_id, content, editor).await
    }

    async fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        self.inner.list_versions(document_id).await
    }
}
