use axum::{http::StatusCode, Extension, Json};
use tracing::warn;

use crate::models::{Document, ErrorResponse, Identity};

/// Identity from the validated token if present, otherwise from the request body
pub fn resolve_identity(
    token_identity: Option<Extension<Identity>>,
    name: Option<String>,
    avatar: Option<String>,
) -> Option<Identity> {
    if let Some(Extension(identity)) = token_identity {
        return Some(identity);
    }
    Some(Identity::new(name?, avatar)).filter(Identity::has_name)
}

/// Fail with 403 unless the identity may replace the page content
pub fn ensure_writer(doc: &Document, identity: Option<&Identity>) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let allowed = match identity {
        Some(identity) => doc.can_write(identity),
        None => doc.access == crate::models::AccessMode::Write,
    };
    if allowed {
        return Ok(());
    }

    let who = identity.map(|i| i.name.as_str()).unwrap_or("anonymous");
    warn!("'{}' has no write access to page {}", who, doc.id);
    Err(ErrorResponse::reply(
        StatusCode::FORBIDDEN,
        format!("No write access to page '{}'", doc.id),
    ))
}
