use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::models::{
    CreateVersionRequest, Document, DocumentVersion, Identity, PageResponse, UpdateContentRequest,
    VersionResponse, VersionsResponse,
};
use crate::store::{DocumentStore, StoreError};

/// Where the autosave writes the full content of a page
#[async_trait]
pub trait ContentPersister: Send + Sync {
    async fn persist(&self, document_id: &str, content: &Value) -> Result<(), StoreError>;
}

/// Where the polling fallback reads a page from. `None` means it is gone.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, document_id: &str) -> Result<Option<Document>, StoreError>;
}

/// REST client of the pages API
#[derive(Clone)]
pub struct HttpPageClient {
    client: Client,
    base_url: String,
    identity: Identity,
    token: Option<String>,
}

impl HttpPageClient {
    pub fn new(base_url: impl Into<String>, identity: Identity, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity,
            token,
        }
    }

    fn page_url(&self, document_id: &str) -> String {
        format!("{}/v1/pages/{}", self.base_url, document_id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get_page(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .authorized(self.client.get(self.page_url(document_id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: PageResponse = response.error_for_status()?.json().await?;
        Ok(Some(body.page))
    }

    pub async fn put_content(&self, document_id: &str, content: &Value) -> Result<Document, StoreError> {
        let request = UpdateContentRequest {
            content: content.clone(),
            name: Some(self.identity.name.clone()),
            avatar: self.identity.avatar.clone(),
        };
        let response = self
            .authorized(self.client.put(format!("{}/content", self.page_url(document_id))))
            .json(&request)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        let body: PageResponse = response.error_for_status()?.json().await?;
        debug!("Saved page {} over http", document_id);
        Ok(body.page)
    }

    /// Snapshot the given content into the version log
    pub async fn save_version(&self, document_id: &str, content: &Value) -> Result<DocumentVersion, StoreError> {
        let request = CreateVersionRequest {
            content: content.clone(),
            edited_by: Some(self.identity.name.clone()),
            avatar: self.identity.avatar.clone(),
        };
        let response = self
            .authorized(self.client.post(format!("{}/versions", self.page_url(document_id))))
            .json(&request)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        let body: VersionResponse = response.error_for_status()?.json().await?;
        Ok(body.version)
    }

    pub async fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        let response = self
            .authorized(self.client.get(format!("{}/versions", self.page_url(document_id))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        let body: VersionsResponse = response.error_for_status()?.json().await?;
        Ok(body.versions)
    }
}

#[async_trait]
impl ContentPersister for HttpPageClient {
    async fn persist(&self, document_id: &str, content: &Value) -> Result<(), StoreError> {
        self.put_content(document_id, content).await.map(|_| ())
    }
}

#[async_trait]
impl DocumentSource for HttpPageClient {
    async fn fetch(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        self.get_page(document_id).await
    }
}

/// Talks to a store in the same process, used by embedders and tests
#[derive(Clone)]
pub struct StoreBridge {
    store: Arc<dyn DocumentStore>,
    identity: Identity,
}

impl StoreBridge {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Identity) -> Self {
        Self { store, identity }
    }
}

#[async_trait]
impl ContentPersister for StoreBridge {
    async fn persist(&self, document_id: &str, content: &Value) -> Result<(), StoreError> {
        self.store
            .replace_content(document_id, content.clone(), Some(&self.identity))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DocumentSource for StoreBridge {
    async fn fetch(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        self.store.get_by_id(document_id).await
    }
}
