use chrono::{Duration, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{password, token};
use crate::error::{AppError, Result};
use crate::models::{parent::ParentAccount, session::ParentSession};
use crate::state::AppState;

/// How many fresh codes are tried before giving up on a collision.
const ACCESS_CODE_ATTEMPTS: usize = 5;

const LOGIN_FAILURE: &str = "Invalid email or password";

/// The cookie values of a freshly opened parent session.
#[derive(Debug, Clone)]
pub struct ParentSessionTokens {
    pub session_id: Uuid,
    pub csrf_token: String,
}

pub fn session_key(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

pub fn csrf_key(csrf_token: &str) -> String {
    format!("csrf:{}", csrf_token)
}

/// Creates a parent account with a fresh access code.
pub async fn register_parent(
    state: &AppState,
    email: &str,
    password: Zeroizing<String>,
    display_name: Option<&str>,
) -> Result<ParentAccount> {
    let email = email.trim().to_lowercase();
    tracing::debug!("Registering parent: {}", email);

    if state.parents.find_parent_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let password_hash = password::hash_secret(password, state.config.hash_cost).await?;
    let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());

    let mut last_conflict = None;
    for _ in 0..ACCESS_CODE_ATTEMPTS {
        let code = token::generate_access_code()?;
        match state
            .parents
            .create_parent(&email, &password_hash, display_name, &code)
            .await
        {
            Ok(parent) => {
                tracing::info!("Parent registered: {}", parent.id);
                return Ok(parent);
            }
            Err(AppError::Conflict(msg)) => {
                if state.parents.find_parent_by_email(&email).await?.is_some() {
                    return Err(AppError::Conflict(msg));
                }
                last_conflict = Some(msg);
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(format!(
        "Could not allocate an access code: {}",
        last_conflict.unwrap_or_default()
    )))
}

/// Checks a parent's email and password. The failure never says which was wrong.
pub async fn authenticate_parent(
    state: &AppState,
    email: &str,
    password: Zeroizing<String>,
) -> Result<ParentAccount> {
    let email = email.trim().to_lowercase();
    tracing::debug!("Authenticating parent: {}", email);

    let parent = state
        .parents
        .find_parent_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Authentication(LOGIN_FAILURE.to_string()))?;

    if !password::verify_secret(password, parent.password_hash.clone()).await? {
        return Err(AppError::Authentication(LOGIN_FAILURE.to_string()));
    }

    tracing::info!("Parent authenticated: {}", parent.id);
    Ok(parent)
}

/// Stores a new parent session and its CSRF token.
pub async fn open_session(state: &AppState, parent_id: Uuid) -> Result<ParentSessionTokens> {
    let now = Utc::now();
    let session = ParentSession {
        parent_id,
        created_at: now,
        expires_at: now + Duration::days(state.config.parent_session_days),
    };
    let session_json = sonic_rs::to_string(&session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

    let ttl_seconds = (state.config.parent_session_days * 86400).max(1) as u64;
    let session_id = Uuid::new_v4();
    state
        .kv
        .set_ex(&session_key(session_id), &session_json, ttl_seconds)
        .await?;

    let csrf_token = token::generate_token()?;
    state
        .kv
        .set_ex(&csrf_key(&csrf_token), &parent_id.to_string(), ttl_seconds)
        .await?;

    tracing::debug!("Parent session opened for {}", parent_id);
    Ok(ParentSessionTokens {
        session_id,
        csrf_token,
    })
}

/// Loads a live parent session.
pub async fn resolve_session(state: &AppState, session_id: Uuid) -> Result<ParentSession> {
    let key = session_key(session_id);
    let session_json = state.kv.get(&key).await?.ok_or(AppError::InvalidSession)?;

    let session: ParentSession = sonic_rs::from_str(&session_json).map_err(|e| {
        tracing::warn!("Unreadable parent session: {}", e);
        AppError::InvalidSession
    })?;

    if Utc::now() >= session.expires_at {
        state.kv.del(&key).await?;
        return Err(AppError::InvalidSession);
    }
    Ok(session)
}

/// Deletes the session and its CSRF token.
pub async fn close_session(
    state: &AppState,
    session_id: Uuid,
    csrf_token: Option<&str>,
) -> Result<()> {
    state.kv.del(&session_key(session_id)).await?;
    if let Some(csrf_token) = csrf_token {
        state.kv.del(&csrf_key(csrf_token)).await?;
    }
    Ok(())
}

pub async fn get_account(state: &AppState, parent_id: Uuid) -> Result<ParentAccount> {
    state
        .parents
        .find_parent_by_id(parent_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// Replaces the parent's access code. The old code stops working at once.
pub async fn regenerate_access_code(state: &AppState, parent_id: Uuid) -> Result<String> {
    for _ in 0..ACCESS_CODE_ATTEMPTS {
        let code = token::generate_access_code()?;
        match state.parents.update_access_code(parent_id, &code).await {
            Ok(()) => {
                tracing::info!("Access code regenerated for parent {}", parent_id);
                return Ok(code);
            }
            Err(AppError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(AppError::Internal("Could not allocate an access code".to_string()))
}
