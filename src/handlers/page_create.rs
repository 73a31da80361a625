use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::resolve_identity;
use crate::models::{CreatePageRequest, Document, ErrorResponse, Identity, PageResponse};
use crate::state::AppState;
use crate::store::StoreError;

/// Create an empty page
pub async fn page_create(
    State(state): State<Arc<AppState>>,
    token_identity: Option<Extension<Identity>>,
    Json(request): Json<CreatePageRequest>,
) -> Result<(StatusCode, Json<PageResponse>), (StatusCode, Json<ErrorResponse>)> {

    if request.title.trim().is_empty() {
        return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, "A page needs a title"));
    }

    // The author is the caller
    let author = match resolve_identity(token_identity, Some(request.author_id), request.avatar) {
        Some(author) => author,
        None => return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, "A page needs an author")),
    };

    let mut doc = Document::new(Uuid::new_v4().to_string(), request.title, &author);
    doc.project_id = request.project_id;
    doc.tags = request.tags;
    doc.breadcrumbs = request.breadcrumbs;

    match state.store.create(doc).await {
        Ok(page) => {
            info!("Page {} created by {}", page.id, author.name);
            Ok((StatusCode::CREATED, Json(PageResponse { page })))
        }
        Err(StoreError::Conflict(id)) => Err(ErrorResponse::reply(
            StatusCode::CONFLICT,
            format!("Page '{}' already exists", id),
        )),
        Err(e) => {
            error!("Failed to create page: {}", e);
            Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create page"))
        }
    }
}
