use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::document::{AccessGrant, AccessMode, Document, DocumentVersion};

/// Request body for creating a page
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    pub title: String,
    pub author_id: String,
    pub avatar: Option<String>,
    pub project_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
}

/// Request body for replacing the content of a page
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    #[schema(value_type = Object)]
    pub content: Value,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// Request body for changing the access mode of a page
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManageAccessRequest {
    pub access: AccessMode,
}

/// Request body for saving a version
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    #[schema(value_type = Object)]
    pub content: Value,
    pub edited_by: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PageResponse {
    pub page: Document,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessListResponse {
    pub access: AccessMode,
    pub access_list: Vec<AccessGrant>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct VersionResponse {
    pub version: DocumentVersion,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct VersionsResponse {
    pub versions: Vec<DocumentVersion>,
}
