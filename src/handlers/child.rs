use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::{auth::bearer_token, rate_limit::ClientIp},
    models::{
        child::ChildLoginEntry,
        library::{Favorite, FavoriteAction, HistoryEntry},
        session::ChildSession,
        usage::UsageReport,
    },
    services::{child_session, children as children_service, library, usage},
    state::AppState,
    validation::ids::parse_uuid,
};

#[derive(Deserialize)]
pub struct VerifyPinRequest {
    #[serde(alias = "childId")]
    pub child_id: String,
    pub pin: String,
}

#[derive(Serialize)]
pub struct VerifyPinResponse {
    pub success: bool,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub child_id: Uuid,
    pub username: String,
    pub avatar_color: String,
    pub parent_id: Uuid,
}

#[derive(Serialize)]
pub struct ChildrenByCodeResponse {
    pub success: bool,
    pub children: Vec<ChildLoginEntry>,
}

#[derive(Deserialize)]
pub struct IncrementUsageRequest {
    pub minutes_used: i32,
}

#[derive(Deserialize)]
pub struct VideoRequest {
    pub video_id: String,
    #[serde(default)]
    pub video_title: String,
    pub video_thumbnail: Option<String>,
    pub search_query: Option<String>,
}

#[derive(Serialize)]
pub struct HistoryEntryResponse {
    pub success: bool,
    pub entry: HistoryEntry,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<HistoryEntry>,
}

#[derive(Serialize)]
pub struct ToggleFavoriteResponse {
    pub success: bool,
    pub action: FavoriteAction,
}

#[derive(Serialize)]
pub struct FavoritesResponse {
    pub success: bool,
    pub favorites: Vec<Favorite>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Lists the children behind a parent access code.
pub async fn children_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ChildrenByCodeResponse>> {
    let children = children_service::children_by_code(&state, &code).await?;
    Ok(Json(ChildrenByCodeResponse {
        success: true,
        children,
    }))
}

/// Exchanges a child id and PIN for a session token.
pub async fn verify_pin(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<VerifyPinRequest>,
) -> Result<Response> {
    let child_id = parse_uuid(&payload.child_id)
        .ok_or_else(|| AppError::Validation("Invalid child ID format".to_string()))?;

    let login = child_session::verify_pin(&state, child_id, &payload.pin, ip).await?;

    let response = VerifyPinResponse {
        success: true,
        session_token: login.session_token,
        expires_at: login.expires_at,
        child_id: login.child.id,
        username: login.child.username,
        avatar_color: login.child.avatar_color,
        parent_id: login.child.parent_id,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Ends the session named by the bearer token.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>> {
    let token = bearer_token(&headers).ok_or(AppError::InvalidSession)?;
    child_session::end_session(&state, token).await?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn get_usage(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
) -> Result<Json<UsageReport>> {
    Ok(Json(usage::get_usage(&state, &session).await?))
}

/// Adds played minutes to today's usage.
///
/// The report that reaches the limit is still returned with `200`, but the
/// session that sent it is ended. Later calls with the token fail with `401`.
pub async fn increment_usage(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
    headers: HeaderMap,
    Json(payload): Json<IncrementUsageRequest>,
) -> Result<Json<UsageReport>> {
    let report = usage::increment_usage(&state, &session, payload.minutes_used).await?;
    if report.is_locked {
        if let Some(token) = bearer_token(&headers) {
            child_session::end_session(&state, token).await?;
        }
    }
    Ok(Json(report))
}

/// The child's 50 most recent plays, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
) -> Result<Json<HistoryResponse>> {
    let history = library::list_history(&state, session.child_id).await?;
    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}

/// Records one play. Responds `201` with the stored entry.
pub async fn append_history(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
    Json(payload): Json<VideoRequest>,
) -> Result<Response> {
    let video = library::video_ref(
        &payload.video_id,
        &payload.video_title,
        payload.video_thumbnail.as_deref(),
    )?;
    let entry =
        library::append_history(&state, &session, video, payload.search_query.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(HistoryEntryResponse {
            success: true,
            entry,
        }),
    )
        .into_response())
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
) -> Result<Json<FavoritesResponse>> {
    let favorites = library::list_favorites(&state, &session).await?;
    Ok(Json(FavoritesResponse {
        success: true,
        favorites,
    }))
}

/// Adds the video to favourites, or removes it if already there.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
    Json(payload): Json<VideoRequest>,
) -> Result<Json<ToggleFavoriteResponse>> {
    let video = library::video_ref(
        &payload.video_id,
        &payload.video_title,
        payload.video_thumbnail.as_deref(),
    )?;
    let action = library::toggle_favorite(&state, &session, video).await?;
    Ok(Json(ToggleFavoriteResponse {
        success: true,
        action,
    }))
}

/// Removes one favourite. Another child's favourite is reported as not found.
pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(session): Extension<ChildSession>,
    Path(favorite_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>> {
    library::remove_favorite(&state, &session, favorite_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
