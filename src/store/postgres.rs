use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{DocumentStore, StoreError};
use crate::models::{AccessGrant, AccessMode, Document, DocumentVersion, Identity};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS pages (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        author_id TEXT NOT NULL,
        project_id TEXT NULL,
        content JSONB NOT NULL,
        access TEXT NOT NULL DEFAULT 'write',
        access_list JSONB NOT NULL DEFAULT '[]',
        is_published BOOLEAN NOT NULL DEFAULT TRUE,
        is_standalone BOOLEAN NOT NULL DEFAULT FALSE,
        tags TEXT[] NOT NULL DEFAULT '{}',
        breadcrumbs TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS page_versions (
        seq BIGSERIAL PRIMARY KEY,
        id UUID NOT NULL UNIQUE,
        page_id TEXT NOT NULL REFERENCES pages(id),
        content JSONB NOT NULL,
        edited_by TEXT NOT NULL,
        avatar_url TEXT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS page_versions_page_seq ON page_versions (page_id, seq)",
];

const PAGE_COLUMNS: &str = "id, title, author_id, project_id, content, access, access_list, \
     is_published, is_standalone, tags, breadcrumbs, created_at, updated_at";

/// Page Row from database
#[derive(Debug, Clone, sqlx::FromRow)]
struct PageRow {
    id: String,
    title: String,
    author_id: String,
    project_id: Option<String>,
    content: Json<Value>,
    access: String,
    access_list: Json<Vec<AccessGrant>>,
    is_published: bool,
    is_standalone: bool,
    tags: Vec<String>,
    breadcrumbs: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PageRow> for Document {
    fn from(row: PageRow) -> Self {
        let access = AccessMode::parse(&row.access).unwrap_or_else(|| {
            warn!("Unknown access mode '{}' on page {}, treating it as write", row.access, row.id);
            AccessMode::Write
        });
        Document {
            id: row.id,
            title: row.title,
            author_id: row.author_id,
            project_id: row.project_id,
            content: row.content.0,
            access,
            access_list: row.access_list.0,
            is_published: row.is_published,
            is_standalone: row.is_standalone,
            tags: row.tags,
            breadcrumbs: row.breadcrumbs,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Page Version Row from database
#[derive(Debug, Clone, sqlx::FromRow)]
struct PageVersionRow {
    id: Uuid,
    page_id: String,
    content: Json<Value>,
    edited_by: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PageVersionRow> for DocumentVersion {
    fn from(row: PageVersionRow) -> Self {
        DocumentVersion {
            id: row.id,
            page_id: row.page_id,
            content: row.content.0,
            edited_by: row.edited_by,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
        }
    }
}

/// Postgres backed document store
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Create a new database connection pool and make sure the tables exist
    pub async fn connect(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), SqlxError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema verified");
        Ok(())
    }

    async fn page_exists(&self, document_id: &str) -> Result<bool, SqlxError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM pages WHERE id = $1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, doc: Document) -> Result<Document, StoreError> {
        let query_sql = format!(
            "INSERT INTO pages ({PAGE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {PAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PageRow>(&query_sql)
            .bind(&doc.id)
            .bind(&doc.title)
            .bind(&doc.author_id)
            .bind(&doc.project_id)
            .bind(Json(&doc.content))
            .bind(doc.access.as_str())
            .bind(Json(&doc.access_list))
            .bind(doc.is_published)
            .bind(doc.is_standalone)
            .bind(&doc.tags)
            .bind(&doc.breadcrumbs)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                info!("Page '{}' created", row.id);
                Ok(row.into())
            }
            None => Err(StoreError::Conflict(doc.id)),
        }
    }

    async fn get_by_id(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let query_sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1");
        let row = sqlx::query_as::<_, PageRow>(&query_sql)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Document::from))
    }

    async fn replace_content(
        &self,
        document_id: &str,
        content: Value,
        editor: Option<&Identity>,
    ) -> Result<Document, StoreError> {
        // Lock the row so that the access list update does not race another writer
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "Failed to acquire connection from pool for page {}: {}. Pool state: {} idle, {} total",
                    document_id,
                    e,
                    self.pool.num_idle(),
                    self.pool.size()
                );
                return Err(e.into());
            }
        };

        let select_sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, PageRow>(&select_sql)
            .bind(document_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut doc: Document = match row {
            Some(row) => row.into(),
            None => return Err(StoreError::NotFound(document_id.to_string())),
        };

        doc.replace_content(content, editor);

        sqlx::query("UPDATE pages SET content = $2, access_list = $3, updated_at = $4 WHERE id = $1")
            .bind(document_id)
            .bind(Json(&doc.content))
            .bind(Json(&doc.access_list))
            .bind(doc.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(doc)
    }

    async fn set_access(&self, document_id: &str, access: AccessMode) -> Result<Document, StoreError> {
        let query_sql = format!(
            "UPDATE pages SET access = $2, updated_at = NOW() WHERE id = $1 RETURNING {PAGE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PageRow>(&query_sql)
            .bind(document_id)
            .bind(access.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Document::from)
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))
    }

    async fn append_version(
        &self,
        document_id: &str,
        content: Value,
        editor: &Identity,
    ) -> Result<DocumentVersion, StoreError> {
        if !self.page_exists(document_id).await? {
            return Err(StoreError::NotFound(document_id.to_string()));
        }

        let version = DocumentVersion::new(document_id, content, editor);
        sqlx::query(
            "INSERT INTO page_versions (id, page_id, content, edited_by, avatar_url, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(version.id)
        .bind(&version.page_id)
        .bind(Json(&version.content))
        .bind(&version.edited_by)
        .bind(&version.avatar_url)
        .bind(version.created_at)
        .execute(&self.pool)
        .await?;

        Ok(version)
    }

    async fn list_versions(&self, document_id: &str) -> Result<Vec<DocumentVersion>, StoreError> {
        let rows = sqlx::query_as::<_, PageVersionRow>(
            "SELECT id, page_id, content, edited_by, avatar_url, created_at \
             FROM page_versions WHERE page_id = $1 ORDER BY seq ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DocumentVersion::from).collect())
    }
}
