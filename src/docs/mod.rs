use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Create a page
#[utoipa::path(
    post,
    path = "/api/v1/pages",
    request_body = CreatePageRequest,
    responses(
        (status = 201, description = "Page created", body = PageResponse),
        (status = 400, description = "Missing title or author", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn page_create_doc() {}

/// Fetch a page
#[utoipa::path(
    get,
    path = "/api/v1/pages/{page_id}",
    params(("page_id" = String, Path, description = "Page id")),
    responses(
        (status = 200, description = "The page", body = PageResponse),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn page_get_doc() {}

/// Replace the content of a page
#[utoipa::path(
    put,
    path = "/api/v1/pages/{page_id}/content",
    params(("page_id" = String, Path, description = "Page id")),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Content replaced", body = PageResponse),
        (status = 403, description = "No write access", body = ErrorResponse),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn page_content_doc() {}

/// Change the access mode of a page
#[utoipa::path(
    put,
    path = "/api/v1/pages/{page_id}/access",
    params(("page_id" = String, Path, description = "Page id")),
    request_body = ManageAccessRequest,
    responses(
        (status = 200, description = "Access changed", body = AccessListResponse),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn page_access_doc() {}

/// List the versions of a page
#[utoipa::path(
    get,
    path = "/api/v1/pages/{page_id}/versions",
    params(("page_id" = String, Path, description = "Page id")),
    responses(
        (status = 200, description = "Versions, oldest first", body = VersionsResponse)
    )
)]
#[allow(dead_code)]
pub async fn page_versions_doc() {}

/// Save a version of a page
#[utoipa::path(
    post,
    path = "/api/v1/pages/{page_id}/versions",
    params(("page_id" = String, Path, description = "Page id")),
    request_body = CreateVersionRequest,
    responses(
        (status = 201, description = "Version saved", body = VersionResponse),
        (status = 404, description = "Page not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn page_version_create_doc() {}

/// Realtime load and process stats
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Diagnostics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        page_create_doc,
        page_get_doc,
        page_content_doc,
        page_access_doc,
        page_versions_doc,
        page_version_create_doc,
        diagnostics_doc,
    ),
    components(
        schemas(
            HealthResponse, ReadyResponse, ErrorResponse, DiagnosticsResponse,
            Identity, AccessMode, AccessGrant, Document, DocumentVersion,
            CreatePageRequest, UpdateContentRequest, ManageAccessRequest, CreateVersionRequest,
            PageResponse, AccessListResponse, VersionResponse, VersionsResponse
        )
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
