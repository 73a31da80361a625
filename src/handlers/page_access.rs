use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::{error, info};

use crate::models::{AccessListResponse, ErrorResponse, ManageAccessRequest};
use crate::state::AppState;
use crate::store::StoreError;

/// Switch a page between read and write access
pub async fn page_access(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Json(request): Json<ManageAccessRequest>,
) -> Result<(StatusCode, Json<AccessListResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.store.set_access(&page_id, request.access).await {
        Ok(page) => {
            info!("Page {} access set to {}", page_id, page.access);
            Ok((StatusCode::OK, Json(AccessListResponse {
                access: page.access,
                access_list: page.access_list,
            })))
        }
        Err(StoreError::NotFound(_)) => Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            format!("Page '{}' not found", page_id),
        )),
        Err(e) => {
            error!("Failed to change access of page '{}': {}", page_id, e);
            Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to change access"))
        }
    }
}
