//! PIN login and child session tokens.
//!
//! A session is stored under the SHA-256 of its bearer token with a TTL that
//! matches its expiry. Every failure to authenticate looks the same to the
//! caller, whether the child exists or not.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{password, token};
use crate::error::{AppError, Result};
use crate::models::{
    child::{ChildAccount, Pin},
    pin_attempt::PinAttempt,
    session::ChildSession,
};
use crate::services::usage;
use crate::state::AppState;

const PIN_FAILURE: &str = "Incorrect PIN";

/// A successful PIN login.
#[derive(Debug)]
pub struct PinLogin {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub child: ChildAccount,
}

fn session_key(token: &str) -> String {
    format!("child_session:{}", token::token_digest(token))
}

fn failure_key(child_id: Uuid) -> String {
    format!("pin_fail:{}", child_id)
}

/// Short, non-reversible tag for log lines.
fn token_tag(token: &str) -> String {
    token::token_digest(token)[..8].to_string()
}

/// Checks a child's PIN and opens a session.
///
/// Locked children are refused a session even with the right PIN.
pub async fn verify_pin(
    state: &AppState,
    child_id: Uuid,
    pin: &str,
    ip_address: Option<String>,
) -> Result<PinLogin> {
    let pin = Pin::parse(pin)?;
    let config = &state.config;

    if config.pin_max_failed_attempts > 0 {
        let failures = state
            .kv
            .get(&failure_key(child_id))
            .await?
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        if failures >= config.pin_max_failed_attempts {
            tracing::warn!("PIN login refused during lockout for child {}", child_id);
            return Err(AppError::RateLimitExceeded(
                "Too many incorrect PINs. Try again later".to_string(),
            ));
        }
    }

    let child = state.children.find_child(child_id).await?;
    let verified = match &child {
        Some(child) => {
            password::verify_secret(
                Zeroizing::new(pin.as_str().to_string()),
                child.pin_hash.clone(),
            )
            .await?
        }
        None => false,
    };

    if child.is_some() {
        let attempt = PinAttempt {
            child_id,
            ip_address,
            was_successful: verified,
            attempt_time: Utc::now(),
        };
        if let Err(e) = state.pin_attempts.record_attempt(&attempt).await {
            tracing::error!("Failed to record PIN attempt: {}", e);
        }
    }

    let child = match child {
        Some(child) if verified => child,
        _ => {
            tracing::warn!("Failed PIN login for child {}", child_id);
            if config.pin_max_failed_attempts > 0 {
                let window = (config.pin_lockout_minutes * 60).max(1) as u64;
                state.kv.incr(&failure_key(child_id), window).await?;
            }
            return Err(AppError::Authentication(PIN_FAILURE.to_string()));
        }
    };

    if config.pin_max_failed_attempts > 0 {
        state.kv.del(&failure_key(child_id)).await?;
    }

    let today = usage::today(config);
    let current = state
        .children
        .read_usage(child.id, today)
        .await?
        .ok_or(AppError::InvalidSession)?;
    if current.locked {
        tracing::info!("Locked child {} tried to start a session", child.id);
        return Err(AppError::TimeLimitReached);
    }

    let session_token = token::generate_token()?;
    let now = Utc::now();
    let session = ChildSession {
        child_id: child.id,
        parent_id: child.parent_id,
        created_at: now,
        expires_at: now + Duration::hours(config.child_session_hours),
        last_activity: now,
    };
    store_session(state, &session_token, &session, now).await?;

    tracing::info!(
        "Child session {} opened for child {}",
        token_tag(&session_token),
        child.id
    );
    Ok(PinLogin {
        session_token,
        expires_at: session.expires_at,
        child,
    })
}

async fn store_session(
    state: &AppState,
    token: &str,
    session: &ChildSession,
    now: DateTime<Utc>,
) -> Result<()> {
    let json = sonic_rs::to_string(session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
    state
        .kv
        .set_ex(&session_key(token), &json, session.ttl_seconds(now))
        .await
}

/// Resolves a bearer token to its live session and records the activity.
///
/// Unknown, expired and orphaned tokens all fail with `InvalidSession`. A
/// locked child's session is ended and fails with `TimeLimitReached`. The
/// activity refresh never recreates a session that was ended meanwhile.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<ChildSession> {
    let key = session_key(token);
    let json = state.kv.get(&key).await?.ok_or_else(|| {
        tracing::debug!("Unknown child session {}", token_tag(token));
        AppError::InvalidSession
    })?;

    let mut session: ChildSession = match sonic_rs::from_str(&json) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Unreadable child session {}: {}", token_tag(token), e);
            state.kv.del(&key).await?;
            return Err(AppError::InvalidSession);
        }
    };

    let now = Utc::now();
    if session.is_expired(now) {
        state.kv.del(&key).await?;
        return Err(AppError::InvalidSession);
    }

    let Some(usage) = state
        .children
        .read_usage(session.child_id, usage::today(&state.config))
        .await?
    else {
        tracing::info!("Child session {} outlived its child", token_tag(token));
        state.kv.del(&key).await?;
        return Err(AppError::InvalidSession);
    };
    if usage.locked {
        tracing::info!(
            "Child session {} ended, child {} is locked",
            token_tag(token),
            session.child_id
        );
        state.kv.del(&key).await?;
        return Err(AppError::TimeLimitReached);
    }

    session.last_activity = now;
    let json = sonic_rs::to_string(&session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
    let refreshed = state
        .kv
        .set_ex_if_exists(&key, &json, session.ttl_seconds(now))
        .await?;
    if !refreshed {
        tracing::debug!("Child session {} ended during the request", token_tag(token));
        return Err(AppError::InvalidSession);
    }
    Ok(session)
}

/// Invalidates a session token.
pub async fn end_session(state: &AppState, token: &str) -> Result<()> {
    state.kv.del(&session_key(token)).await?;
    tracing::info!("Child session {} closed", token_tag(token));
    Ok(())
}
