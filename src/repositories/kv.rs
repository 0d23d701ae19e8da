use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::error::Result;

/// Expiring key-value storage for sessions, CSRF tokens and counters.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
    /// Overwrites `key` only while it still exists. Returns whether it was written.
    async fn set_ex_if_exists(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Increments a counter. The TTL is set when the counter is created and
    /// not extended afterwards, so the window is fixed.
    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<i64>;
    /// Seconds left before `key` expires, `None` when it is absent or persistent.
    async fn ttl(&self, key: &str) -> Result<Option<i64>>;
}

/// Redis-backed [`KeyValueStore`].
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyValueStore for RedisKv {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn set_ex_if_exists(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(key, ttl_seconds as i64).await?;
        }
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await?;
        // -2 means missing, -1 means no expiry.
        Ok((ttl >= 0).then_some(ttl))
    }
}
