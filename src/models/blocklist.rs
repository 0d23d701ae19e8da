use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// A parent-scoped phrase. Stored lower-cased.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedPhrase {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub phrase: String,
    pub blocked_at: DateTime<Utc>,
}

impl TryFrom<&Row> for BlockedPhrase {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            parent_id: row.try_get("parent_id")?,
            phrase: row.try_get("phrase")?,
            blocked_at: row.try_get("blocked_at")?,
        })
    }
}

/// A parent-scoped provider video id excluded from results.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedSong {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub video_id: String,
    pub video_title: String,
    pub blocked_at: DateTime<Utc>,
}

impl TryFrom<&Row> for BlockedSong {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            parent_id: row.try_get("parent_id")?,
            video_id: row.try_get("video_id")?,
            video_title: row.try_get("video_title")?,
            blocked_at: row.try_get("blocked_at")?,
        })
    }
}
