use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DocumentStore, StoreError};
use crate::models::{AccessMode, Document, DocumentVersion, Identity};

/// Process local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
    versions: RwLock<HashMap<String, Vec<DocumentVersion>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, doc: Document) -> Result<Document, StoreError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&doc.id) {
            return Err(StoreError::Conflict(doc.id));
        }
        documents.insert(doc.id.clone(), doc.clone());
        debug!("Created document {}", doc.id);
        Ok(doc)
    }

    async fn get_by_id(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(document_id).cloned())
    }

    async fn replace_content(
        &self,
        document_id: &str,
        content: Value,
        editor: Option<&Identity>,
    ) -> Result<Document, StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))?;
        doc.replace_content(content, editor);
        Ok(doc.clone())
    }

    async fn set_access(&self, document_id: &str, access: AccessMode) -> Result<Document, StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))?;
        doc.access = access;
        Ok(doc.clone())
    }

    async fn append_version(
        &self,
        document_id: &str,
        content: Value,
        editor: &Identity,
    ) -> Result<DocumentVersion, StoreError> {
        if !self.documents.read().await.contains_key(document_id) {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        let version = DocumentVersion::new(document_id, content, editor);
        self.versions
            .write()
            .await
            .entry(document_id.to_string())
            .or_default()
            .push(version.clone());
        Ok(version)
    }

    async fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        Ok(self
            .versions
            .read()
            .await
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replace_content_is_whole_payload() {
        let store = MemoryDocumentStore::new();
        let alice = Identity::named("Alice");
        store.create(Document::new("doc1", "Notes", &alice)).await.unwrap();

        store.replace_content("doc1", json!({"a": 1, "b": 2}), None).await.unwrap();
        let doc = store.replace_content("doc1", json!({"c": 3}), None).await.unwrap();

        assert_eq!(doc.content, json!({"c": 3}));
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store.replace_content("nope", json!({}), None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
        assert!(store.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn versions_keep_insertion_order() {
        let store = MemoryDocumentStore::new();
        let alice = Identity::named("Alice");
        store.create(Document::new("doc1", "Notes", &alice)).await.unwrap();

        for n in 0..3 {
            store.append_version("doc1", json!({ "n": n }), &alice).await.unwrap();
        }

        let contents: Vec<Value> = store
            .list_versions("doc1")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.content)
            .collect();
        assert_eq!(contents, vec![json!({"n": 0}), json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = MemoryDocumentStore::new();
        let alice = Identity::named("Alice");
        store.create(Document::new("doc1", "Notes", &alice)).await.unwrap();
        let err = store.create(Document::new("doc1", "Other", &alice)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
