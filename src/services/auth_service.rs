use axum::http::{self};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation, TokenData};
use tracing::debug;

use crate::models::Identity;

// Get the auth token from a request
pub fn get_auth_token<B>(req: &http::Request<B>) -> Result<String, String> {
    get_auth_token_from_headers(req.headers())
}

// Get the auth token from request headers
pub fn get_auth_token_from_headers(headers: &http::HeaderMap) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = headers.get(http::header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for cookie in cookie::Cookie::split_parse(cookie_header).flatten() {
            if cookie.name() == "auth_token" {
                return Ok(cookie.value().to_string());
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

// Build the caller identity from the token claims: `name` (or `sub`) and `avatar`
pub fn identity_from_claims(claims: &serde_json::Value) -> Option<Identity> {
    let name = claims
        .get("name")
        .and_then(|v| v.as_str())
        .or_else(|| claims.get("sub").and_then(|v| v.as_str()))?;
    let avatar = claims.get("avatar").and_then(|v| v.as_str()).map(str::to_string);
    let identity = Identity::new(name, avatar);
    debug!("Resolved identity '{}' from token", identity.name);
    identity.has_name().then_some(identity)
}

// Token, validation and claims in one step, for callers outside the middleware
pub fn identity_from_headers(headers: &http::HeaderMap, secret: &str) -> Result<Identity, String> {
    let token = get_auth_token_from_headers(headers)?;
    let token_data = validate_jwt(&token, secret).map_err(|e| format!("JWT validation failed: {}", e))?;
    identity_from_claims(&token_data.claims)
        .ok_or_else(|| "JWT token does not carry a name or sub claim".to_string())
}
