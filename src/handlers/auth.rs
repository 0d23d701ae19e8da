use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use zeroize::Zeroizing;

use crate::{
    error::Result,
    middleware_layer::{
        auth::{extract_session_id, SESSION_COOKIE},
        csrf::CSRF_COOKIE,
    },
    models::{parent::ParentProfile, session::ParentSession},
    services::auth::{self as auth_service, ParentSessionTokens},
    state::AppState,
    validation::auth::{validate, LoginRequest, RegisterRequest},
};

/// The response payload for parent authentication requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentProfile>,
}

/// Builds a session-scoped cookie. Only the CSRF cookie is visible to scripts.
fn create_cookie(name: &'static str, value: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(name != CSRF_COOKIE);
    cookie.set_secure(secure);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_seconds));
    cookie.set_path("/");
    cookie
}

fn set_session_cookies(state: &AppState, cookies: &Cookies, tokens: ParentSessionTokens) {
    let max_age = state.config.parent_session_days * 86400;
    let secure = state.config.secure_cookies;
    cookies.add(create_cookie(
        SESSION_COOKIE,
        tokens.session_id.to_string(),
        max_age,
        secure,
    ));
    cookies.add(create_cookie(CSRF_COOKIE, tokens.csrf_token, max_age, secure));
}

fn clear_session_cookies(cookies: &Cookies) {
    for name in [SESSION_COOKIE, CSRF_COOKIE] {
        let mut cookie = Cookie::new(name, "");
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}

/// Handles parent registration.
pub async fn register(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("Register attempt: {:?}", payload);
    validate(&payload)?;

    let parent = auth_service::register_parent(
        &state,
        &payload.email,
        Zeroizing::new(payload.password),
        payload.display_name.as_deref(),
    )
    .await?;

    let tokens = auth_service::open_session(&state, parent.id).await?;
    set_session_cookies(&state, &cookies, tokens);

    let response = AuthResponse {
        success: true,
        message: "Registration successful. Welcome!".to_string(),
        parent: Some(ParentProfile::from(&parent)),
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles parent login.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("Login attempt: {:?}", payload);
    validate(&payload)?;

    let parent =
        auth_service::authenticate_parent(&state, &payload.email, Zeroizing::new(payload.password))
            .await?;

    let tokens = auth_service::open_session(&state, parent.id).await?;
    set_session_cookies(&state, &cookies, tokens);

    let response = AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        parent: Some(ParentProfile::from(&parent)),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles parent logout.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    cookies: Cookies,
) -> Result<Response> {
    if let Some(session_id) = extract_session_id(&cookies) {
        let csrf_token = cookies.get(CSRF_COOKIE).map(|c| c.value().to_string());
        auth_service::close_session(&state, session_id, csrf_token.as_deref()).await?;
    }
    clear_session_cookies(&cookies);

    tracing::info!("Parent logged out: {}", session.parent_id);
    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
        parent: None,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}
