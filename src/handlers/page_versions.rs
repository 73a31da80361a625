use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Extension, Json};
use tracing::{error, info};

use crate::auth::resolve_identity;
use crate::models::{CreateVersionRequest, ErrorResponse, Identity, VersionResponse, VersionsResponse};
use crate::state::AppState;
use crate::store::StoreError;

/// List the saved versions of a page, oldest first
pub async fn page_versions(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<(StatusCode, Json<VersionsResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.store.list_versions(&page_id).await {
        Ok(versions) => Ok((StatusCode::OK, Json(VersionsResponse { versions }))),
        Err(e) => {
            error!("Failed to list versions of page '{}': {}", page_id, e);
            Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Save the given content as a new version
pub async fn page_version_create(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    token_identity: Option<Extension<Identity>>,
    Json(request): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<VersionResponse>), (StatusCode, Json<ErrorResponse>)> {

    let editor = match resolve_identity(token_identity, request.edited_by, request.avatar) {
        Some(editor) => editor,
        None => return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, "A version needs an editor")),
    };

    match state.store.append_version(&page_id, request.content, &editor).await {
        Ok(version) => {
            info!("Version {} saved for page {} by {}", version.id, page_id, editor.name);
            Ok((StatusCode::CREATED, Json(VersionResponse { version })))
        }
        Err(StoreError::NotFound(_)) => Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            format!("Page '{}' not found", page_id),
        )),
        Err(e) => {
            error!("Failed to save version of page '{}': {}", page_id, e);
            Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save version"))
        }
    }
}
