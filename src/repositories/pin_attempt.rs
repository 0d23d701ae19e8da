use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{PgStore, PinAttemptStore};
use crate::{error::Result, models::pin_attempt::PinAttempt};

#[async_trait]
impl PinAttemptStore for PgStore {
    async fn record_attempt(&self, attempt: &PinAttempt) -> Result<()> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO pin_attempts (id, child_id, ip_address, was_successful, attempt_time)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .await?;
        client
            .execute(
                &stmt,
                &[
                    &Uuid::new_v4(),
                    &attempt.child_id,
                    &attempt.ip_address,
                    &attempt.was_successful,
                    &attempt.attempt_time,
                ],
            )
            .await?;
        Ok(())
    }

    async fn purge_attempts_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("DELETE FROM pin_attempts WHERE attempt_time < $1")
            .await?;
        Ok(client.execute(&stmt, &[&cutoff]).await?)
    }
}
