use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::{
    BlocklistStore, ChildStore, KeyValueStore, LibraryStore, ParentStore, PgStore,
    PinAttemptStore, RedisKv,
};
use crate::services::search::{VideoProvider, YouTubeProvider};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    pub parents: Arc<dyn ParentStore>,
    pub children: Arc<dyn ChildStore>,
    pub library: Arc<dyn LibraryStore>,
    pub blocklists: Arc<dyn BlocklistStore>,
    pub pin_attempts: Arc<dyn PinAttemptStore>,
    /// Sessions, CSRF tokens and counters.
    pub kv: Arc<dyn KeyValueStore>,
    /// The external video search.
    pub videos: Arc<dyn VideoProvider>,
}

impl AppState {
    /// Connects to Postgres, Redis and the YouTube API.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = crate::db::create_pool(&config.database_url)?;
        crate::db::run_migrations(&pool).await?;
        tracing::info!("PostgreSQL pool initialized");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("Redis connection manager initialized");

        let videos = YouTubeProvider::new(config)?;

        Ok(Self::with_backend(
            config.clone(),
            PgStore::new(pool),
            Arc::new(RedisKv::new(redis)),
            Arc::new(videos),
        ))
    }

    /// Builds a state where one backend serves every relational store.
    pub fn with_backend<S>(
        config: Config,
        store: S,
        kv: Arc<dyn KeyValueStore>,
        videos: Arc<dyn VideoProvider>,
    ) -> Self
    where
        S: ParentStore
            + ChildStore
            + LibraryStore
            + BlocklistStore
            + PinAttemptStore
            + Clone
            + 'static,
    {
        Self {
            config: Arc::new(config),
            parents: Arc::new(store.clone()),
            children: Arc::new(store.clone()),
            library: Arc::new(store.clone()),
            blocklists: Arc::new(store.clone()),
            pin_attempts: Arc::new(store),
            kv,
            videos,
        }
    }
}
