use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::blocklist::{BlockedPhrase, BlockedSong};
use crate::services::{filter::MAX_QUERY_CHARS, library};
use crate::state::AppState;

/// Trims and lower-cases a phrase for storage.
pub fn normalize_phrase(raw: &str) -> Result<String> {
    let phrase = raw.trim().to_lowercase();
    if phrase.is_empty() {
        return Err(AppError::Validation("Phrase cannot be empty".to_string()));
    }
    if phrase.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "Phrase must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }
    Ok(phrase)
}

pub async fn list_phrases(state: &AppState, parent_id: Uuid) -> Result<Vec<BlockedPhrase>> {
    state.blocklists.list_phrases(parent_id).await
}

pub async fn add_phrase(state: &AppState, parent_id: Uuid, raw: &str) -> Result<BlockedPhrase> {
    let phrase = normalize_phrase(raw)?;
    let entry = state.blocklists.add_phrase(parent_id, &phrase).await?;
    tracing::info!("Parent {} blocked a phrase", parent_id);
    Ok(entry)
}

pub async fn remove_phrase(state: &AppState, parent_id: Uuid, id: Uuid) -> Result<()> {
    if !state.blocklists.remove_phrase(parent_id, id).await? {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn list_songs(state: &AppState, parent_id: Uuid) -> Result<Vec<BlockedSong>> {
    state.blocklists.list_songs(parent_id).await
}

pub async fn add_song(
    state: &AppState,
    parent_id: Uuid,
    video_id: &str,
    video_title: &str,
) -> Result<BlockedSong> {
    let video = library::video_ref(video_id, video_title, None)?;
    let entry = state
        .blocklists
        .add_song(parent_id, &video.video_id, &video.video_title)
        .await?;
    tracing::info!("Parent {} blocked video {}", parent_id, entry.video_id);
    Ok(entry)
}

pub async fn remove_song(state: &AppState, parent_id: Uuid, id: Uuid) -> Result<()> {
    if !state.blocklists.remove_song(parent_id, id).await? {
        return Err(AppError::NotFound);
    }
    Ok(())
}
