//! Key-based authorization guard
//!
//! One guard function decides every gated request. The admin secret passes
//! every gate; store keys pass only routes that do not require the admin.

use super::error::ApiError;
use super::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;

/// Privilege a route demands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Admin,
    ApiKey,
}

/// Who a request was authorized as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorized {
    Admin,
    Key(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid or revoked API key")]
    Invalid,
    #[error("admin key required")]
    Forbidden,
    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

/// Decide whether `headers` carry a credential meeting `requirement`
pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    requirement: Requirement,
) -> Result<Authorized, AuthError> {
    let presented = headers
        .get(state.api_key_header())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::Missing)?;

    if state.is_admin_key(presented) {
        return Ok(Authorized::Admin);
    }

    let active = state
        .keys
        .is_active(presented)
        .map_err(|e| AuthError::Unavailable(e.to_string()))?;

    match (active, requirement) {
        (false, _) => Err(AuthError::Invalid),
        (true, Requirement::Admin) => Err(AuthError::Forbidden),
        (true, Requirement::ApiKey) => Ok(Authorized::Key(presented.to_string())),
    }
}

async fn guard(
    state: AppState,
    request: Request,
    next: Next,
    requirement: Requirement,
) -> Result<Response, ApiError> {
    let who = authorize(&state, request.headers(), requirement)?;
    if let Authorized::Key(_) = who {
        log::debug!("{} {} authorized by API key", request.method(), request.uri().path());
    }
    Ok(next.run(request).await)
}

/// Middleware for admin-only routes
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    guard(state, request, next, Requirement::Admin).await
}

/// Middleware for routes open to any active key
pub async fn require_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    guard(state, request, next, Requirement::ApiKey).await
}
