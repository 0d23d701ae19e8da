use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// One played video. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub child_id: Uuid,
    pub video_id: String,
    pub video_title: String,
    pub video_thumbnail: Option<String>,
    pub search_query: Option<String>,
    pub played_at: DateTime<Utc>,
}

impl TryFrom<&Row> for HistoryEntry {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            child_id: row.try_get("child_id")?,
            video_id: row.try_get("video_id")?,
            video_title: row.try_get("video_title")?,
            video_thumbnail: row.try_get("video_thumbnail")?,
            search_query: row.try_get("search_query")?,
            played_at: row.try_get("played_at")?,
        })
    }
}

/// A favourited video. Unique per `(child_id, video_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub child_id: Uuid,
    pub video_id: String,
    pub video_title: String,
    pub video_thumbnail: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl TryFrom<&Row> for Favorite {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            child_id: row.try_get("child_id")?,
            video_id: row.try_get("video_id")?,
            video_title: row.try_get("video_title")?,
            video_thumbnail: row.try_get("video_thumbnail")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

/// The video a history or favourite operation refers to.
#[derive(Debug, Clone)]
pub struct VideoRef {
    pub video_id: String,
    pub video_title: String,
    pub video_thumbnail: Option<String>,
}

/// What a favourite toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteAction {
    Added,
    Removed,
}
