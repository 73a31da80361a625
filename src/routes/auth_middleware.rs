use std::sync::Arc;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use crate::services::auth_service::{get_auth_token, identity_from_claims, validate_jwt};
use crate::state::AppState;

/// Resolve the caller identity from the identity provider's token.
///
/// Without a configured secret requests pass through and handlers fall back
/// to the identity in the request body.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {

    // 1. Nothing to validate against
    let secret = match &state.config.auth_jwt_secret {
        Some(secret) => secret,
        None => return Ok(next.run(req).await),
    };

    // 2. Get the auth token from the request
    let token = match get_auth_token(&req) {
        Ok(token) => token,
        Err(e) => {
            debug!("No auth token on request: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 3. Validate Token
    let token_data = match validate_jwt(&token, secret) {
        Ok(token_data) => token_data,
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 4. Extract the identity for downstream handlers
    let identity = identity_from_claims(&token_data.claims).ok_or_else(|| {
        error!("JWT token does not carry a name or sub claim");
        StatusCode::UNAUTHORIZED
    })?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
