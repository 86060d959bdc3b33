use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::middleware::Next;
use axum::body::Body;

use crate::config::Config;

// api key validation
pub async fn validate_api_key(
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // extract api key hash from request extensions (set during router setup)
    let api_key_hash = req
        .extensions()
        .get::<String>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    // get api key from header
    let provided_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing X-API-Key header");
            StatusCode::UNAUTHORIZED
        })?;

    // hash the provided key and compare
    let provided_hash = Config::hash_api_key(provided_key);

    if provided_hash != *api_key_hash {
        tracing::warn!("🚫 Invalid API key attempt");
        return Err(StatusCode::UNAUTHORIZED);
    }

    tracing::debug!("API key validated successfully");
    Ok(next.run(req).await)
}
