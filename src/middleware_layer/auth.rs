use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::{auth as auth_service, child_session},
    state::AppState,
};

/// Name of the parent session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the parent session id from the request cookies.
pub fn extract_session_id(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Extracts the token of an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Requires a live parent session cookie and exposes the `ParentSession`.
pub async fn require_parent(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = extract_session_id(&cookies).ok_or_else(|| {
        tracing::debug!("No parent session cookie");
        AppError::InvalidSession
    })?;

    let session = auth_service::resolve_session(&state, session_id).await?;
    tracing::debug!("Parent authenticated: {}", session.parent_id);

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Requires a live child session token and exposes the `ChildSession`.
pub async fn require_child_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or(AppError::InvalidSession)?
        .to_string();

    let session = child_session::resolve_session(&state, &token).await?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
