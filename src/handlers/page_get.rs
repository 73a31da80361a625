use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::error;

use crate::models::{ErrorResponse, PageResponse};
use crate::state::AppState;

/// Fetch a page, used by clients on load and by the polling fallback
pub async fn page_get(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<(StatusCode, Json<PageResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.store.get_by_id(&page_id).await {
        Ok(Some(page)) => Ok((StatusCode::OK, Json(PageResponse { page }))),
        Ok(None) => Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            format!("Page '{}' not found", page_id),
        )),
        Err(e) => {
            error!("Error loading page '{}': {}", page_id, e);
            Err(ErrorResponse::reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error loading page '{}'", page_id),
            ))
        }
    }
}
