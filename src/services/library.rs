use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    library::{Favorite, FavoriteAction, HistoryEntry, VideoRef},
    session::ChildSession,
};
use crate::services::filter::MAX_QUERY_CHARS;
use crate::state::AppState;

/// How many history entries a listing returns.
pub const HISTORY_LIMIT: i64 = 50;

const MAX_VIDEO_ID_LEN: usize = 64;
const MAX_TITLE_CHARS: usize = 500;
const MAX_THUMBNAIL_LEN: usize = 2048;

/// Validates the video fields sent by the client.
pub fn video_ref(
    video_id: &str,
    video_title: &str,
    video_thumbnail: Option<&str>,
) -> Result<VideoRef> {
    let video_id = video_id.trim();
    if video_id.is_empty() || video_id.len() > MAX_VIDEO_ID_LEN {
        return Err(AppError::Validation("Invalid video_id".to_string()));
    }
    if video_title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation("video_title is too long".to_string()));
    }
    let video_thumbnail = video_thumbnail.map(str::trim).filter(|t| !t.is_empty());
    if video_thumbnail.is_some_and(|t| t.len() > MAX_THUMBNAIL_LEN) {
        return Err(AppError::Validation("video_thumbnail is too long".to_string()));
    }
    Ok(VideoRef {
        video_id: video_id.to_string(),
        video_title: video_title.to_string(),
        video_thumbnail: video_thumbnail.map(str::to_string),
    })
}

pub async fn append_history(
    state: &AppState,
    session: &ChildSession,
    video: VideoRef,
    search_query: Option<&str>,
) -> Result<HistoryEntry> {
    let search_query = search_query.map(str::trim).filter(|q| !q.is_empty());
    if search_query.is_some_and(|q| q.chars().count() > MAX_QUERY_CHARS) {
        return Err(AppError::Validation("search_query is too long".to_string()));
    }
    let entry = state
        .library
        .append_history(session.child_id, &video, search_query)
        .await?;
    tracing::debug!("History appended for child {}: {}", session.child_id, entry.video_id);
    Ok(entry)
}

pub async fn list_history(state: &AppState, child_id: Uuid) -> Result<Vec<HistoryEntry>> {
    state.library.list_history(child_id, HISTORY_LIMIT).await
}

pub async fn toggle_favorite(
    state: &AppState,
    session: &ChildSession,
    video: VideoRef,
) -> Result<FavoriteAction> {
    let action = state.library.toggle_favorite(session.child_id, &video).await?;
    tracing::debug!(
        "Favorite {:?} for child {}: {}",
        action,
        session.child_id,
        video.video_id
    );
    Ok(action)
}

pub async fn list_favorites(state: &AppState, session: &ChildSession) -> Result<Vec<Favorite>> {
    state.library.list_favorites(session.child_id).await
}

pub async fn remove_favorite(
    state: &AppState,
    session: &ChildSession,
    favorite_id: Uuid,
) -> Result<()> {
    if !state
        .library
        .remove_favorite(session.child_id, favorite_id)
        .await?
    {
        return Err(AppError::NotFound);
    }
    Ok(())
}
