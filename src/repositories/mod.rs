//! Storage seams.
//!
//! Every aggregate is reached through an `async_trait` so services can run
//! against Postgres in production and against [`memory::MemoryStore`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    blocklist::{BlockedPhrase, BlockedSong},
    child::{ChildAccount, ChildUpdate, NewChild},
    library::{Favorite, FavoriteAction, HistoryEntry, VideoRef},
    parent::ParentAccount,
    pin_attempt::PinAttempt,
    usage::UsageSnapshot,
};

pub mod blocklist;
pub mod child;
pub mod kv;
pub mod library;
pub mod memory;
pub mod parent;
pub mod pin_attempt;

pub use kv::{KeyValueStore, RedisKv};

#[async_trait]
pub trait ParentStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_parent(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        access_code: &str,
    ) -> Result<ParentAccount>;
    async fn find_parent_by_email(&self, email: &str) -> Result<Option<ParentAccount>>;
    async fn find_parent_by_id(&self, id: Uuid) -> Result<Option<ParentAccount>>;
    async fn find_parent_by_access_code(&self, code: &str) -> Result<Option<ParentAccount>>;
    /// Fails with `Conflict` when the code is already in use.
    async fn update_access_code(&self, id: Uuid, code: &str) -> Result<()>;
}

#[async_trait]
pub trait ChildStore: Send + Sync {
    async fn create_child(&self, child: &NewChild) -> Result<ChildAccount>;
    async fn find_child(&self, id: Uuid) -> Result<Option<ChildAccount>>;
    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<ChildAccount>>;
    async fn update_child(
        &self,
        id: Uuid,
        parent_id: Uuid,
        update: &ChildUpdate,
    ) -> Result<Option<ChildAccount>>;
    async fn delete_child(&self, id: Uuid, parent_id: Uuid) -> Result<bool>;

    /// Reads usage with the daily rollover applied and persisted.
    async fn read_usage(&self, child_id: Uuid, today: NaiveDate) -> Result<Option<UsageSnapshot>>;

    /// Rollover, increment and lock recomputation as one atomic step.
    async fn increment_usage(
        &self,
        child_id: Uuid,
        minutes: i32,
        today: NaiveDate,
    ) -> Result<Option<UsageSnapshot>>;

    async fn reset_usage(
        &self,
        child_id: Uuid,
        parent_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<UsageSnapshot>>;

    /// Resets every child whose counters belong to an earlier day.
    async fn rollover_all(&self, today: NaiveDate) -> Result<u64>;
}

#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn append_history(
        &self,
        child_id: Uuid,
        video: &VideoRef,
        search_query: Option<&str>,
    ) -> Result<HistoryEntry>;
    /// Newest first.
    async fn list_history(&self, child_id: Uuid, limit: i64) -> Result<Vec<HistoryEntry>>;
    /// Removes the favourite if present, adds it otherwise. Never duplicates.
    async fn toggle_favorite(&self, child_id: Uuid, video: &VideoRef) -> Result<FavoriteAction>;
    /// Newest first.
    async fn list_favorites(&self, child_id: Uuid) -> Result<Vec<Favorite>>;
    async fn remove_favorite(&self, child_id: Uuid, favorite_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait BlocklistStore: Send + Sync {
    /// Newest first.
    async fn list_phrases(&self, parent_id: Uuid) -> Result<Vec<BlockedPhrase>>;
    async fn add_phrase(&self, parent_id: Uuid, phrase: &str) -> Result<BlockedPhrase>;
    async fn remove_phrase(&self, parent_id: Uuid, id: Uuid) -> Result<bool>;
    /// Newest first.
    async fn list_songs(&self, parent_id: Uuid) -> Result<Vec<BlockedSong>>;
    async fn add_song(&self, parent_id: Uuid, video_id: &str, video_title: &str) -> Result<BlockedSong>;
    async fn remove_song(&self, parent_id: Uuid, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PinAttemptStore: Send + Sync {
    async fn record_attempt(&self, attempt: &PinAttempt) -> Result<()>;
    async fn purge_attempts_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// The Postgres backend. Implements every relational store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
fn conflict_or_database(e: tokio_postgres::Error, message: &str) -> AppError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(e)
    }
}
