use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_postgres::Row;
use uuid::Uuid;

use super::{ChildStore, PgStore};
use crate::{
    error::Result,
    models::{
        child::{ChildAccount, ChildUpdate, NewChild},
        usage::UsageSnapshot,
    },
};

const CHILD_COLUMNS: &str = "id, parent_id, username, pin_hash, avatar_color, \
    daily_time_limit_minutes, time_used_today, is_locked, last_reset_date, created_at";

/// Applies the rollover and persists it, returning the day's counters.
const READ_USAGE: &str = r#"
    UPDATE child_accounts
    SET time_used_today = CASE
            WHEN last_reset_date IS NULL OR last_reset_date < $2 THEN 0
            ELSE time_used_today
        END,
        is_locked = CASE
            WHEN last_reset_date IS NULL OR last_reset_date < $2 THEN 0
            ELSE time_used_today
        END >= daily_time_limit_minutes,
        last_reset_date = GREATEST(COALESCE(last_reset_date, $2), $2)
    WHERE id = $1
    RETURNING time_used_today, daily_time_limit_minutes, is_locked, last_reset_date
"#;

/// Rollover and increment in one statement so concurrent devices never lose a minute.
const INCREMENT_USAGE: &str = r#"
    UPDATE child_accounts
    SET time_used_today = CASE
            WHEN last_reset_date IS NULL OR last_reset_date < $3 THEN $2
            ELSE time_used_today + $2
        END,
        is_locked = CASE
            WHEN last_reset_date IS NULL OR last_reset_date < $3 THEN $2
            ELSE time_used_today + $2
        END >= daily_time_limit_minutes,
        last_reset_date = GREATEST(COALESCE(last_reset_date, $3), $3)
    WHERE id = $1
    RETURNING time_used_today, daily_time_limit_minutes, is_locked, last_reset_date
"#;

fn row_to_usage(row: &Row) -> Result<UsageSnapshot> {
    Ok(UsageSnapshot {
        used: row.try_get("time_used_today")?,
        limit: row.try_get("daily_time_limit_minutes")?,
        locked: row.try_get("is_locked")?,
        last_reset_date: row.try_get("last_reset_date")?,
    })
}

#[async_trait]
impl ChildStore for PgStore {
    async fn create_child(&self, child: &NewChild) -> Result<ChildAccount> {
        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            INSERT INTO child_accounts
                (id, parent_id, username, pin_hash, avatar_color, daily_time_limit_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CHILD_COLUMNS}
            "#
        );
        let stmt = client.prepare_cached(&sql).await?;
        let row = client
            .query_one(
                &stmt,
                &[
                    &Uuid::new_v4(),
                    &child.parent_id,
                    &child.username.as_str(),
                    &child.pin_hash,
                    &child.avatar_color.as_str(),
                    &child.daily_limit.minutes(),
                ],
            )
            .await?;
        Ok(ChildAccount::try_from(&row)?)
    }

    async fn find_child(&self, id: Uuid) -> Result<Option<ChildAccount>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {CHILD_COLUMNS} FROM child_accounts WHERE id = $1");
        let stmt = client.prepare_cached(&sql).await?;
        let row = client.query_opt(&stmt, &[&id]).await?;
        Ok(row.map(|r| ChildAccount::try_from(&r)).transpose()?)
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<ChildAccount>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {CHILD_COLUMNS} FROM child_accounts WHERE parent_id = $1 ORDER BY created_at ASC"
        );
        let stmt = client.prepare_cached(&sql).await?;
        let rows = client.query(&stmt, &[&parent_id]).await?;
        Ok(rows
            .iter()
            .map(ChildAccount::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn update_child(
        &self,
        id: Uuid,
        parent_id: Uuid,
        update: &ChildUpdate,
    ) -> Result<Option<ChildAccount>> {
        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            UPDATE child_accounts
            SET username = COALESCE($3, username),
                pin_hash = COALESCE($4, pin_hash),
                avatar_color = COALESCE($5, avatar_color),
                daily_time_limit_minutes = COALESCE($6, daily_time_limit_minutes),
                is_locked = time_used_today >= COALESCE($6, daily_time_limit_minutes)
            WHERE id = $1 AND parent_id = $2
            RETURNING {CHILD_COLUMNS}
            "#
        );
        let stmt = client.prepare_cached(&sql).await?;
        let row = client
            .query_opt(
                &stmt,
                &[
                    &id,
                    &parent_id,
                    &update.username.as_ref().map(|n| n.as_str()),
                    &update.pin_hash.as_deref(),
                    &update.avatar_color.as_ref().map(|c| c.as_str()),
                    &update.daily_limit.map(|l| l.minutes()),
                ],
            )
            .await?;
        Ok(row.map(|r| ChildAccount::try_from(&r)).transpose()?)
    }

    async fn delete_child(&self, id: Uuid, parent_id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM child_accounts WHERE id = $1 AND parent_id = $2")
            .await?;
        Ok(client.execute(&stmt, &[&id, &parent_id]).await? > 0)
    }

    async fn read_usage(&self, child_id: Uuid, today: NaiveDate) -> Result<Option<UsageSnapshot>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(READ_USAGE).await?;
        let row = client.query_opt(&stmt, &[&child_id, &today]).await?;
        row.map(|r| row_to_usage(&r)).transpose()
    }

    async fn increment_usage(
        &self,
        child_id: Uuid,
        minutes: i32,
        today: NaiveDate,
    ) -> Result<Option<UsageSnapshot>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(INCREMENT_USAGE).await?;
        let row = client.query_opt(&stmt, &[&child_id, &minutes, &today]).await?;
        row.map(|r| row_to_usage(&r)).transpose()
    }

    async fn reset_usage(
        &self,
        child_id: Uuid,
        parent_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<UsageSnapshot>> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                UPDATE child_accounts
                SET time_used_today = 0, is_locked = false, last_reset_date = $3
                WHERE id = $1 AND parent_id = $2
                RETURNING time_used_today, daily_time_limit_minutes, is_locked, last_reset_date
                "#,
            )
            .await?;
        let row = client.query_opt(&stmt, &[&child_id, &parent_id, &today]).await?;
        row.map(|r| row_to_usage(&r)).transpose()
    }

    async fn rollover_all(&self, today: NaiveDate) -> Result<u64> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                UPDATE child_accounts
                SET time_used_today = 0, is_locked = false, last_reset_date = $1
                WHERE last_reset_date IS NULL OR last_reset_date < $1
                "#,
            )
            .await?;
        Ok(client.execute(&stmt, &[&today]).await?)
    }
}
