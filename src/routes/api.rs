use std::sync::Arc;
use axum::{middleware, routing::{get, post, put}, Router};

use crate::handlers::{
    diagnostics, health_check, page_access, page_content, page_create, page_get, page_version_create,
    page_versions, ready_check,
};
use crate::routes::auth_middleware::auth_middleware;
use crate::state::AppState;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/v1/pages", post(page_create))
        .route("/v1/pages/:page_id", get(page_get))
        .route("/v1/pages/:page_id/content", put(page_content))
        .route("/v1/pages/:page_id/access", put(page_access))
        .route("/v1/pages/:page_id/versions", get(page_versions).post(page_version_create))
        .route("/v1/diagnostics", get(diagnostics))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)); // Applies to all routes added above

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .merge(v1)
        .with_state(state)
}
