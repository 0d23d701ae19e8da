use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        blocklist::{BlockedPhrase, BlockedSong},
        child::ChildSummary,
        library::HistoryEntry,
        parent::ParentProfile,
        session::ParentSession,
        usage::UsageReport,
    },
    services::{
        auth as auth_service, blocklist as blocklist_service,
        children::{self as children_service, ChildInput, ChildPatch},
    },
    state::AppState,
};

#[derive(Serialize)]
pub struct AccountResponse {
    pub success: bool,
    pub account: ParentProfile,
}

#[derive(Serialize)]
pub struct AccessCodeResponse {
    pub success: bool,
    pub access_code: String,
}

#[derive(Deserialize)]
pub struct CreateChildRequest {
    pub username: String,
    pub pin: String,
    pub avatar_color: String,
    pub daily_time_limit_minutes: i32,
}

impl std::fmt::Debug for CreateChildRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateChildRequest")
            .field("username", &self.username)
            .field("avatar_color", &self.avatar_color)
            .field("daily_time_limit_minutes", &self.daily_time_limit_minutes)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Default)]
pub struct UpdateChildRequest {
    pub username: Option<String>,
    pub pin: Option<String>,
    pub avatar_color: Option<String>,
    pub daily_time_limit_minutes: Option<i32>,
}

#[derive(Serialize)]
pub struct ChildResponse {
    pub success: bool,
    pub child: ChildSummary,
}

#[derive(Serialize)]
pub struct ChildrenResponse {
    pub success: bool,
    pub children: Vec<ChildSummary>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
pub struct AddPhraseRequest {
    pub phrase: String,
}

#[derive(Deserialize)]
pub struct AddSongRequest {
    pub video_id: String,
    pub video_title: String,
}

#[derive(Serialize)]
pub struct PhraseResponse {
    pub success: bool,
    pub phrase: BlockedPhrase,
}

#[derive(Serialize)]
pub struct PhrasesResponse {
    pub success: bool,
    pub phrases: Vec<BlockedPhrase>,
}

#[derive(Serialize)]
pub struct SongResponse {
    pub success: bool,
    pub song: BlockedSong,
}

#[derive(Serialize)]
pub struct SongsResponse {
    pub success: bool,
    pub songs: Vec<BlockedSong>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn ok() -> Json<SuccessResponse> {
    Json(SuccessResponse { success: true })
}

/// Returns the signed-in parent's account.
pub async fn get_account(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
) -> Result<Json<AccountResponse>> {
    let parent = auth_service::get_account(&state, session.parent_id).await?;
    Ok(Json(AccountResponse {
        success: true,
        account: ParentProfile::from(&parent),
    }))
}

/// Replaces the access code. The old code stops resolving at once.
pub async fn regenerate_access_code(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
) -> Result<Json<AccessCodeResponse>> {
    let access_code = auth_service::regenerate_access_code(&state, session.parent_id).await?;
    Ok(Json(AccessCodeResponse {
        success: true,
        access_code,
    }))
}

/// Lists the parent's children with today's usage.
pub async fn list_children(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
) -> Result<Json<ChildrenResponse>> {
    let children = children_service::list_children(&state, session.parent_id).await?;
    Ok(Json(ChildrenResponse {
        success: true,
        children,
    }))
}

/// Creates a child profile. Responds `201`.
pub async fn create_child(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Json(payload): Json<CreateChildRequest>,
) -> Result<Response> {
    tracing::debug!("Create child: {:?}", payload);
    let child = children_service::create_child(
        &state,
        session.parent_id,
        ChildInput {
            username: &payload.username,
            pin: &payload.pin,
            avatar_color: &payload.avatar_color,
            daily_time_limit_minutes: payload.daily_time_limit_minutes,
        },
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ChildResponse {
            success: true,
            child,
        }),
    )
        .into_response())
}

/// Applies a partial update.
///
/// A new PIN is hashed before it is stored. A new daily limit takes effect on
/// the next usage read, so raising it can unlock the child.
pub async fn update_child(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Path(child_id): Path<Uuid>,
    Json(payload): Json<UpdateChildRequest>,
) -> Result<Json<ChildResponse>> {
    let child = children_service::update_child(
        &state,
        session.parent_id,
        child_id,
        ChildPatch {
            username: payload.username.as_deref(),
            pin: payload.pin.as_deref(),
            avatar_color: payload.avatar_color.as_deref(),
            daily_time_limit_minutes: payload.daily_time_limit_minutes,
        },
    )
    .await?;
    Ok(Json(ChildResponse {
        success: true,
        child,
    }))
}

/// Deletes the child with its history, favourites and PIN attempts.
pub async fn delete_child(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Path(child_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>> {
    children_service::delete_child(&state, session.parent_id, child_id).await?;
    Ok(ok())
}

/// Sets today's usage back to zero and unlocks the child.
pub async fn reset_usage(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Path(child_id): Path<Uuid>,
) -> Result<Json<UsageReport>> {
    let report = children_service::reset_usage(&state, session.parent_id, child_id).await?;
    Ok(Json(report))
}

pub async fn child_history(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Path(child_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>> {
    let history = children_service::child_history(&state, session.parent_id, child_id).await?;
    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}

/// Lists blocked phrases, newest first.
pub async fn list_phrases(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
) -> Result<Json<PhrasesResponse>> {
    let phrases = blocklist_service::list_phrases(&state, session.parent_id).await?;
    Ok(Json(PhrasesResponse {
        success: true,
        phrases,
    }))
}

/// Blocks a phrase. The phrase is trimmed and lowercased; a duplicate is a `409`.
pub async fn add_phrase(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Json(payload): Json<AddPhraseRequest>,
) -> Result<Response> {
    let phrase = blocklist_service::add_phrase(&state, session.parent_id, &payload.phrase).await?;
    Ok((
        StatusCode::CREATED,
        Json(PhraseResponse {
            success: true,
            phrase,
        }),
    )
        .into_response())
}

pub async fn remove_phrase(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>> {
    blocklist_service::remove_phrase(&state, session.parent_id, id).await?;
    Ok(ok())
}

pub async fn list_songs(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
) -> Result<Json<SongsResponse>> {
    let songs = blocklist_service::list_songs(&state, session.parent_id).await?;
    Ok(Json(SongsResponse {
        success: true,
        songs,
    }))
}

pub async fn add_song(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Json(payload): Json<AddSongRequest>,
) -> Result<Response> {
    let song = blocklist_service::add_song(
        &state,
        session.parent_id,
        &payload.video_id,
        &payload.video_title,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(SongResponse { success: true, song })).into_response())
}

/// Unblocks a song.
pub async fn remove_song(
    State(state): State<AppState>,
    Extension(session): Extension<ParentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>> {
    blocklist_service::remove_song(&state, session.parent_id, id).await?;
    Ok(ok())
}
