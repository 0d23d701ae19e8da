use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sonic_rs::JsonValueTrait;
use std::{convert::Infallible, net::SocketAddr};

use crate::{error::AppError, state::AppState};

/// Registrations allowed per client address and window.
const REGISTER_LIMIT: i64 = 5;
const REGISTER_WINDOW_SECONDS: u64 = 12 * 3600;

/// Failed logins allowed per email and window.
const LOGIN_FAILURE_LIMIT: i64 = 5;
const LOGIN_WINDOW_SECONDS: u64 = 15 * 60;

/// Largest login body inspected for the email.
const LOGIN_BODY_LIMIT: usize = 64 * 1024;

/// The peer address, when the server was started with connect info.
fn peer_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

/// The caller's address, if known. Never rejects.
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(peer_ip(&parts.extensions)))
    }
}

async fn window_exhausted(state: &AppState, key: &str, limit: i64) -> Option<i64> {
    let count = state
        .kv
        .get(key)
        .await
        .ok()
        .flatten()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    if count < limit {
        return None;
    }
    Some(state.kv.ttl(key).await.ok().flatten().unwrap_or(0))
}

/// Limits parent registrations per client address.
pub async fn rate_limit_register(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = peer_ip(req.extensions()).unwrap_or_else(|| "unknown".to_string());
    let key = format!("rate_limit:register:{}", ip);

    if let Some(ttl) = window_exhausted(&state, &key, REGISTER_LIMIT).await {
        tracing::warn!("Registration limit reached for {}", ip);
        return AppError::RateLimitExceeded(format!(
            "Registration limit exceeded. Try again in {} minutes",
            (ttl + 59) / 60
        ))
        .into_response();
    }

    if let Err(e) = state.kv.incr(&key, REGISTER_WINDOW_SECONDS).await {
        tracing::error!("Rate limit counter failed: {}", e);
    }

    next.run(req).await
}

/// Limits failed parent logins per email. A successful login clears the count.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, LOGIN_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Validation("Request body too large".to_string()).into_response();
        }
    };

    let email = sonic_rs::from_slice::<sonic_rs::Value>(&body_bytes)
        .ok()
        .and_then(|json| json.get("email").and_then(|v| v.as_str()).map(|s| s.trim().to_lowercase()))
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("rate_limit:login:{}", email);

    if let Some(ttl) = window_exhausted(&state, &key, LOGIN_FAILURE_LIMIT).await {
        tracing::warn!("Login limit reached for {}", email);
        return AppError::RateLimitExceeded(format!(
            "Too many failed login attempts. Try again in {} minutes",
            (ttl + 59) / 60
        ))
        .into_response();
    }

    let response = next.run(Request::from_parts(parts, Body::from(body_bytes))).await;

    if response.status().is_client_error() {
        if let Err(e) = state.kv.incr(&key, LOGIN_WINDOW_SECONDS).await {
            tracing::error!("Rate limit counter failed: {}", e);
        }
    } else if response.status().is_success() {
        if let Err(e) = state.kv.del(&key).await {
            tracing::error!("Rate limit reset failed: {}", e);
        }
    }

    response
}
