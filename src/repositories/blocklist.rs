use async_trait::async_trait;
use uuid::Uuid;

use super::{conflict_or_database, BlocklistStore, PgStore};
use crate::{
    error::Result,
    models::blocklist::{BlockedPhrase, BlockedSong},
};

#[async_trait]
impl BlocklistStore for PgStore {
    async fn list_phrases(&self, parent_id: Uuid) -> Result<Vec<BlockedPhrase>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, parent_id, phrase, blocked_at
                FROM blocked_phrases
                WHERE parent_id = $1
                ORDER BY blocked_at DESC
                "#,
            )
            .await?;
        let rows = client.query(&stmt, &[&parent_id]).await?;
        Ok(rows
            .iter()
            .map(BlockedPhrase::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn add_phrase(&self, parent_id: Uuid, phrase: &str) -> Result<BlockedPhrase> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO blocked_phrases (id, parent_id, phrase)
                VALUES ($1, $2, $3)
                RETURNING id, parent_id, phrase, blocked_at
                "#,
            )
            .await?;
        let row = client
            .query_one(&stmt, &[&Uuid::new_v4(), &parent_id, &phrase])
            .await
            .map_err(|e| conflict_or_database(e, "Phrase is already blocked"))?;
        Ok(BlockedPhrase::try_from(&row)?)
    }

    async fn remove_phrase(&self, parent_id: Uuid, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM blocked_phrases WHERE id = $1 AND parent_id = $2")
            .await?;
        Ok(client.execute(&stmt, &[&id, &parent_id]).await? > 0)
    }

    async fn list_songs(&self, parent_id: Uuid) -> Result<Vec<BlockedSong>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, parent_id, video_id, video_title, blocked_at
                FROM blocked_songs
                WHERE parent_id = $1
                ORDER BY blocked_at DESC
                "#,
            )
            .await?;
        let rows = client.query(&stmt, &[&parent_id]).await?;
        Ok(rows
            .iter()
            .map(BlockedSong::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn add_song(&self, parent_id: Uuid, video_id: &str, video_title: &str) -> Result<BlockedSong> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO blocked_songs (id, parent_id, video_id, video_title)
                VALUES ($1, $2, $3, $4)
                RETURNING id, parent_id, video_id, video_title, blocked_at
                "#,
            )
            .await?;
        let row = client
            .query_one(&stmt, &[&Uuid::new_v4(), &parent_id, &video_id, &video_title])
            .await
            .map_err(|e| conflict_or_database(e, "Song is already blocked"))?;
        Ok(BlockedSong::try_from(&row)?)
    }

    async fn remove_song(&self, parent_id: Uuid, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM blocked_songs WHERE id = $1 AND parent_id = $2")
            .await?;
        Ok(client.execute(&stmt, &[&id, &parent_id]).await? > 0)
    }
}
