use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Extension, Json};
use tracing::{error, info};

use crate::auth::{ensure_writer, resolve_identity};
use crate::models::{ErrorResponse, Identity, PageResponse, UpdateContentRequest};
use crate::state::AppState;
use crate::store::StoreError;

/// Replace the content of a page wholesale. This is the autosave target.
pub async fn page_content(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    token_identity: Option<Extension<Identity>>,
    Json(request): Json<UpdateContentRequest>,
) -> Result<(StatusCode, Json<PageResponse>), (StatusCode, Json<ErrorResponse>)> {

    let editor = resolve_identity(token_identity, request.name, request.avatar);

    // Load the page to check the writer
    let doc = match state.store.get_by_id(&page_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            return Err(ErrorResponse::reply(
                StatusCode::NOT_FOUND,
                format!("Page '{}' not found", page_id),
            ))
        }
        Err(e) => {
            error!("Error loading page '{}': {}", page_id, e);
            return Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Error loading page"));
        }
    };
    ensure_writer(&doc, editor.as_ref())?;

    // Last write wins
    match state.store.replace_content(&page_id, request.content, editor.as_ref()).await {
        Ok(page) => {
            info!("Page {} content replaced", page_id);
            Ok((StatusCode::OK, Json(PageResponse { page })))
        }
        Err(StoreError::NotFound(_)) => Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            format!("Page '{}' not found", page_id),
        )),
        Err(e) => {
            error!("Failed to update page '{}': {}", page_id, e);
            Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update page"))
        }
    }
}
