use async_trait::async_trait;
use uuid::Uuid;

use super::{LibraryStore, PgStore};
use crate::{
    error::Result,
    models::library::{Favorite, FavoriteAction, HistoryEntry, VideoRef},
};

#[async_trait]
impl LibraryStore for PgStore {
    async fn append_history(
        &self,
        child_id: Uuid,
        video: &VideoRef,
        search_query: Option<&str>,
    ) -> Result<HistoryEntry> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO playback_history
                    (id, child_id, video_id, video_title, video_thumbnail, search_query)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, child_id, video_id, video_title, video_thumbnail, search_query, played_at
                "#,
            )
            .await?;
        let row = client
            .query_one(
                &stmt,
                &[
                    &Uuid::new_v4(),
                    &child_id,
                    &video.video_id,
                    &video.video_title,
                    &video.video_thumbnail,
                    &search_query,
                ],
            )
            .await?;
        Ok(HistoryEntry::try_from(&row)?)
    }

    async fn list_history(&self, child_id: Uuid, limit: i64) -> Result<Vec<HistoryEntry>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, child_id, video_id, video_title, video_thumbnail, search_query, played_at
                FROM playback_history
                WHERE child_id = $1
                ORDER BY played_at DESC
                LIMIT $2
                "#,
            )
            .await?;
        let rows = client.query(&stmt, &[&child_id, &limit]).await?;
        Ok(rows
            .iter()
            .map(HistoryEntry::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn toggle_favorite(&self, child_id: Uuid, video: &VideoRef) -> Result<FavoriteAction> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let removed = tx
            .execute(
                "DELETE FROM favorites WHERE child_id = $1 AND video_id = $2",
                &[&child_id, &video.video_id],
            )
            .await?;

        let action = if removed > 0 {
            FavoriteAction::Removed
        } else {
            tx.execute(
                r#"
                INSERT INTO favorites (id, child_id, video_id, video_title, video_thumbnail)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (child_id, video_id) DO NOTHING
                "#,
                &[
                    &Uuid::new_v4(),
                    &child_id,
                    &video.video_id,
                    &video.video_title,
                    &video.video_thumbnail,
                ],
            )
            .await?;
            FavoriteAction::Added
        };

        tx.commit().await?;
        Ok(action)
    }

    async fn list_favorites(&self, child_id: Uuid) -> Result<Vec<Favorite>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, child_id, video_id, video_title, video_thumbnail, added_at
                FROM favorites
                WHERE child_id = $1
                ORDER BY added_at DESC
                "#,
            )
            .await?;
        let rows = client.query(&stmt, &[&child_id]).await?;
        Ok(rows
            .iter()
            .map(Favorite::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn remove_favorite(&self, child_id: Uuid, favorite_id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM favorites WHERE id = $1 AND child_id = $2")
            .await?;
        Ok(client.execute(&stmt, &[&favorite_id, &child_id]).await? > 0)
    }
}
