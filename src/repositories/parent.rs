use async_trait::async_trait;
use uuid::Uuid;

use super::{conflict_or_database, ParentStore, PgStore};
use crate::{error::{AppError, Result}, models::parent::ParentAccount};

const PARENT_COLUMNS: &str = "id, email, password_hash, display_name, access_code, created_at";

#[async_trait]
impl ParentStore for PgStore {
    async fn create_parent(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        access_code: &str,
    ) -> Result<ParentAccount> {
        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            INSERT INTO parent_accounts (id, email, password_hash, display_name, access_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PARENT_COLUMNS}
            "#
        );
        let stmt = client.prepare_cached(&sql).await?;
        let row = client
            .query_one(
                &stmt,
                &[&Uuid::new_v4(), &email, &password_hash, &display_name, &access_code],
            )
            .await
            .map_err(|e| conflict_or_database(e, "An account with this email already exists"))?;
        Ok(ParentAccount::try_from(&row)?)
    }

    async fn find_parent_by_email(&self, email: &str) -> Result<Option<ParentAccount>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {PARENT_COLUMNS} FROM parent_accounts WHERE email = $1");
        let stmt = client.prepare_cached(&sql).await?;
        let row = client.query_opt(&stmt, &[&email]).await?;
        Ok(row.map(|r| ParentAccount::try_from(&r)).transpose()?)
    }

    async fn find_parent_by_id(&self, id: Uuid) -> Result<Option<ParentAccount>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {PARENT_COLUMNS} FROM parent_accounts WHERE id = $1");
        let stmt = client.prepare_cached(&sql).await?;
        let row = client.query_opt(&stmt, &[&id]).await?;
        Ok(row.map(|r| ParentAccount::try_from(&r)).transpose()?)
    }

    async fn find_parent_by_access_code(&self, code: &str) -> Result<Option<ParentAccount>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {PARENT_COLUMNS} FROM parent_accounts WHERE access_code = $1");
        let stmt = client.prepare_cached(&sql).await?;
        let row = client.query_opt(&stmt, &[&code]).await?;
        Ok(row.map(|r| ParentAccount::try_from(&r)).transpose()?)
    }

    async fn update_access_code(&self, id: Uuid, code: &str) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("UPDATE parent_accounts SET access_code = $2 WHERE id = $1")
            .await?;
        let updated = client
            .execute(&stmt, &[&id, &code])
            .await
            .map_err(|e| conflict_or_database(e, "Access code already in use"))?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
