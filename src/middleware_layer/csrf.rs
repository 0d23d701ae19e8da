use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use subtle::ConstantTimeEq;
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    models::session::ParentSession,
    services::auth::csrf_key,
    state::AppState,
};

/// Name of the CSRF cookie. Readable by scripts so it can be echoed in the header.
pub const CSRF_COOKIE: &str = "csrf_token";
/// Header carrying the echoed CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Double-submit CSRF check for mutating parent requests.
///
/// Runs after `require_parent`; the token must also belong to that parent.
pub async fn verify_csrf(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::GET
        || req.method() == Method::HEAD
        || req.method() == Method::OPTIONS
    {
        return next.run(req).await;
    }

    let Some(cookie_token) = cookies.get(CSRF_COOKIE).map(|c| c.value().to_string()) else {
        tracing::warn!("CSRF: cookie missing");
        return AppError::Authentication("Missing CSRF token cookie".to_string()).into_response();
    };

    let header_token = match req.headers().get(CSRF_HEADER).map(|v| v.to_str()) {
        Some(Ok(token)) => token.to_string(),
        Some(Err(_)) => {
            tracing::warn!("CSRF: header is not valid text");
            return AppError::Authentication("Invalid CSRF token format".to_string())
                .into_response();
        }
        None => {
            tracing::warn!("CSRF: header missing");
            return AppError::Authentication("Missing CSRF token header".to_string())
                .into_response();
        }
    };

    if !bool::from(cookie_token.as_bytes().ct_eq(header_token.as_bytes())) {
        tracing::warn!("CSRF: cookie and header differ");
        return AppError::Authentication("CSRF token mismatch".to_string()).into_response();
    }

    match state.kv.get(&csrf_key(&cookie_token)).await {
        Ok(Some(owner)) if owner == session.parent_id.to_string() => next.run(req).await,
        Ok(_) => {
            tracing::warn!("CSRF: token expired or issued to another session");
            AppError::Authentication("CSRF token expired or invalid".to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("CSRF: lookup failed: {}", e);
            e.into_response()
        }
    }
}
