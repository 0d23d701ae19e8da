//! In-process storage backend.
//!
//! Implements every store trait over a single mutex-guarded dataset so that
//! the usage ledger keeps its atomicity guarantee without a database. Used by
//! the test-suite and handy for local runs without Postgres or Redis.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

use super::{BlocklistStore, ChildStore, KeyValueStore, LibraryStore, ParentStore, PinAttemptStore};
use crate::{
    error::{AppError, Result},
    models::{
        blocklist::{BlockedPhrase, BlockedSong},
        child::{ChildAccount, ChildUpdate, NewChild},
        library::{Favorite, FavoriteAction, HistoryEntry, VideoRef},
        parent::ParentAccount,
        pin_attempt::PinAttempt,
        usage::{is_locked, UsageSnapshot},
    },
};

#[derive(Default)]
struct Data {
    parents: HashMap<Uuid, ParentAccount>,
    children: HashMap<Uuid, ChildAccount>,
    history: Vec<HistoryEntry>,
    favorites: Vec<Favorite>,
    phrases: Vec<BlockedPhrase>,
    songs: Vec<BlockedSong>,
    pin_attempts: Vec<PinAttempt>,
}

/// Relational stores held in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a child's usage counters.
    pub async fn set_usage(&self, child_id: Uuid, used: i32, last_reset_date: Option<NaiveDate>) -> Result<()> {
        let mut data = self.data.lock().await;
        let child = data.children.get_mut(&child_id).ok_or(AppError::NotFound)?;
        child.time_used_today = used;
        child.is_locked = is_locked(used, child.daily_time_limit_minutes);
        child.last_reset_date = last_reset_date;
        Ok(())
    }

    /// Every recorded PIN attempt for `child_id`, oldest first.
    pub async fn pin_attempts(&self, child_id: Uuid) -> Vec<PinAttempt> {
        let data = self.data.lock().await;
        data.pin_attempts
            .iter()
            .filter(|a| a.child_id == child_id)
            .cloned()
            .collect()
    }

    /// Number of favourite rows for `child_id`.
    pub async fn favorite_count(&self, child_id: Uuid) -> usize {
        let data = self.data.lock().await;
        data.favorites.iter().filter(|f| f.child_id == child_id).count()
    }
}

#[async_trait]
impl ParentStore for MemoryStore {
    async fn create_parent(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        access_code: &str,
    ) -> Result<ParentAccount> {
        let mut data = self.data.lock().await;
        if data.parents.values().any(|p| p.email == email) {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        if data.parents.values().any(|p| p.access_code == access_code) {
            return Err(AppError::Conflict("Access code already in use".to_string()));
        }
        let parent = ParentAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            display_name: display_name.map(str::to_string),
            access_code: access_code.to_string(),
            created_at: Utc::now(),
        };
        data.parents.insert(parent.id, parent.clone());
        Ok(parent)
    }

    async fn find_parent_by_email(&self, email: &str) -> Result<Option<ParentAccount>> {
        let data = self.data.lock().await;
        Ok(data.parents.values().find(|p| p.email == email).cloned())
    }

    async fn find_parent_by_id(&self, id: Uuid) -> Result<Option<ParentAccount>> {
        let data = self.data.lock().await;
        Ok(data.parents.get(&id).cloned())
    }

    async fn find_parent_by_access_code(&self, code: &str) -> Result<Option<ParentAccount>> {
        let data = self.data.lock().await;
        Ok(data.parents.values().find(|p| p.access_code == code).cloned())
    }

    async fn update_access_code(&self, id: Uuid, code: &str) -> Result<()> {
        let mut data = self.data.lock().await;
        if data.parents.values().any(|p| p.id != id && p.access_code == code) {
            return Err(AppError::Conflict("Access code already in use".to_string()));
        }
        let parent = data.parents.get_mut(&id).ok_or(AppError::NotFound)?;
        parent.access_code = code.to_string();
        Ok(())
    }
}

#[async_trait]
impl ChildStore for MemoryStore {
    async fn create_child(&self, child: &NewChild) -> Result<ChildAccount> {
        let mut data = self.data.lock().await;
        let account = ChildAccount {
            id: Uuid::new_v4(),
            parent_id: child.parent_id,
            username: child.username.as_str().to_string(),
            pin_hash: child.pin_hash.clone(),
            avatar_color: child.avatar_color.as_str().to_string(),
            daily_time_limit_minutes: child.daily_limit.minutes(),
            time_used_today: 0,
            is_locked: false,
            last_reset_date: None,
            created_at: Utc::now(),
        };
        data.children.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_child(&self, id: Uuid) -> Result<Option<ChildAccount>> {
        let data = self.data.lock().await;
        Ok(data.children.get(&id).cloned())
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<ChildAccount>> {
        let data = self.data.lock().await;
        let mut children: Vec<_> = data
            .children
            .values()
            .filter(|c| c.parent_id == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(|c| c.created_at);
        Ok(children)
    }

    async fn update_child(
        &self,
        id: Uuid,
        parent_id: Uuid,
        update: &ChildUpdate,
    ) -> Result<Option<ChildAccount>> {
        let mut data = self.data.lock().await;
        let Some(child) = data.children.get_mut(&id).filter(|c| c.parent_id == parent_id) else {
            return Ok(None);
        };
        if let Some(name) = &update.username {
            child.username = name.as_str().to_string();
        }
        if let Some(hash) = &update.pin_hash {
            child.pin_hash = hash.clone();
        }
        if let Some(color) = &update.avatar_color {
            child.avatar_color = color.as_str().to_string();
        }
        if let Some(limit) = update.daily_limit {
            child.daily_time_limit_minutes = limit.minutes();
        }
        child.is_locked = is_locked(child.time_used_today, child.daily_time_limit_minutes);
        Ok(Some(child.clone()))
    }

    async fn delete_child(&self, id: Uuid, parent_id: Uuid) -> Result<bool> {
        let mut data = self.data.lock().await;
        let owned = data.children.get(&id).is_some_and(|c| c.parent_id == parent_id);
        if !owned {
            return Ok(false);
        }
        data.children.remove(&id);
        data.history.retain(|h| h.child_id != id);
        data.favorites.retain(|f| f.child_id != id);
        data.pin_attempts.retain(|a| a.child_id != id);
        Ok(true)
    }

    async fn read_usage(&self, child_id: Uuid, today: NaiveDate) -> Result<Option<UsageSnapshot>> {
        let mut data = self.data.lock().await;
        let Some(child) = data.children.get_mut(&child_id) else {
            return Ok(None);
        };
        let usage = child.usage().rolled_over(today);
        child.apply_usage(usage);
        Ok(Some(usage))
    }

    async fn increment_usage(
        &self,
        child_id: Uuid,
        minutes: i32,
        today: NaiveDate,
    ) -> Result<Option<UsageSnapshot>> {
        let mut data = self.data.lock().await;
        let Some(child) = data.children.get_mut(&child_id) else {
            return Ok(None);
        };
        let usage = child.usage().incremented(minutes, today);
        child.apply_usage(usage);
        Ok(Some(usage))
    }

    async fn reset_usage(
        &self,
        child_id: Uuid,
        parent_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<UsageSnapshot>> {
        let mut data = self.data.lock().await;
        let Some(child) = data
            .children
            .get_mut(&child_id)
            .filter(|c| c.parent_id == parent_id)
        else {
            return Ok(None);
        };
        child.time_used_today = 0;
        child.is_locked = false;
        child.last_reset_date = Some(today);
        Ok(Some(child.usage()))
    }

    async fn rollover_all(&self, today: NaiveDate) -> Result<u64> {
        let mut data = self.data.lock().await;
        let mut reset = 0;
        for child in data.children.values_mut() {
            if child.last_reset_date.is_none_or(|day| day < today) {
                child.time_used_today = 0;
                child.is_locked = false;
                child.last_reset_date = Some(today);
                reset += 1;
            }
        }
        Ok(reset)
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn append_history(
        &self,
        child_id: Uuid,
        video: &VideoRef,
        search_query: Option<&str>,
    ) -> Result<HistoryEntry> {
        let mut data = self.data.lock().await;
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            child_id,
            video_id: video.video_id.clone(),
            video_title: video.video_title.clone(),
            video_thumbnail: video.video_thumbnail.clone(),
            search_query: search_query.map(str::to_string),
            played_at: Utc::now(),
        };
        data.history.push(entry.clone());
        Ok(entry)
    }

    async fn list_history(&self, child_id: Uuid, limit: i64) -> Result<Vec<HistoryEntry>> {
        let data = self.data.lock().await;
        Ok(data
            .history
            .iter()
            .rev()
            .filter(|h| h.child_id == child_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn toggle_favorite(&self, child_id: Uuid, video: &VideoRef) -> Result<FavoriteAction> {
        let mut data = self.data.lock().await;
        let before = data.favorites.len();
        data.favorites
            .retain(|f| !(f.child_id == child_id && f.video_id == video.video_id));
        if data.favorites.len() < before {
            return Ok(FavoriteAction::Removed);
        }
        data.favorites.push(Favorite {
            id: Uuid::new_v4(),
            child_id,
            video_id: video.video_id.clone(),
            video_title: video.video_title.clone(),
            video_thumbnail: video.video_thumbnail.clone(),
            added_at: Utc::now(),
        });
        Ok(FavoriteAction::Added)
    }

    async fn list_favorites(&self, child_id: Uuid) -> Result<Vec<Favorite>> {
        let data = self.data.lock().await;
        Ok(data
            .favorites
            .iter()
            .rev()
            .filter(|f| f.child_id == child_id)
            .cloned()
            .collect())
    }

    async fn remove_favorite(&self, child_id: Uuid, favorite_id: Uuid) -> Result<bool> {
        let mut data = self.data.lock().await;
        let before = data.favorites.len();
        data.favorites
            .retain(|f| !(f.id == favorite_id && f.child_id == child_id));
        Ok(data.favorites.len() < before)
    }
}

#[async_trait]
impl BlocklistStore for MemoryStore {
    async fn list_phrases(&self, parent_id: Uuid) -> Result<Vec<BlockedPhrase>> {
        let data = self.data.lock().await;
        Ok(data
            .phrases
            .iter()
            .rev()
            .filter(|p| p.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn add_phrase(&self, parent_id: Uuid, phrase: &str) -> Result<BlockedPhrase> {
        let mut data = self.data.lock().await;
        if data
            .phrases
            .iter()
            .any(|p| p.parent_id == parent_id && p.phrase == phrase)
        {
            return Err(AppError::Conflict("Phrase is already blocked".to_string()));
        }
        let entry = BlockedPhrase {
            id: Uuid::new_v4(),
            parent_id,
            phrase: phrase.to_string(),
            blocked_at: Utc::now(),
        };
        data.phrases.push(entry.clone());
        Ok(entry)
    }

    async fn remove_phrase(&self, parent_id: Uuid, id: Uuid) -> Result<bool> {
        let mut data = self.data.lock().await;
        let before = data.phrases.len();
        data.phrases.retain(|p| !(p.id == id && p.parent_id == parent_id));
        Ok(data.phrases.len() < before)
    }

    async fn list_songs(&self, parent_id: Uuid) -> Result<Vec<BlockedSong>> {
        let data = self.data.lock().await;
        Ok(data
            .songs
            .iter()
            .rev()
            .filter(|s| s.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn add_song(&self, parent_id: Uuid, video_id: &str, video_title: &str) -> Result<BlockedSong> {
        let mut data = self.data.lock().await;
        if data
            .songs
            .iter()
            .any(|s| s.parent_id == parent_id && s.video_id == video_id)
        {
            return Err(AppError::Conflict("Song is already blocked".to_string()));
        }
        let entry = BlockedSong {
            id: Uuid::new_v4(),
            parent_id,
            video_id: video_id.to_string(),
            video_title: video_title.to_string(),
            blocked_at: Utc::now(),
        };
        data.songs.push(entry.clone());
        Ok(entry)
    }

    async fn remove_song(&self, parent_id: Uuid, id: Uuid) -> Result<bool> {
        let mut data = self.data.lock().await;
        let before = data.songs.len();
        data.songs.retain(|s| !(s.id == id && s.parent_id == parent_id));
        Ok(data.songs.len() < before)
    }
}

#[async_trait]
impl PinAttemptStore for MemoryStore {
    async fn record_attempt(&self, attempt: &PinAttempt) -> Result<()> {
        let mut data = self.data.lock().await;
        // Mirrors the foreign key: attempts for unknown children are not kept.
        if data.children.contains_key(&attempt.child_id) {
            data.pin_attempts.push(attempt.clone());
        }
        Ok(())
    }

    async fn purge_attempts_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut data = self.data.lock().await;
        let before = data.pin_attempts.len();
        data.pin_attempts.retain(|a| a.attempt_time >= cutoff);
        Ok((before - data.pin_attempts.len()) as u64)
    }
}

/// Key-value store held in memory. Expiry follows the tokio clock.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, (String, Option<Instant>)>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

fn live(entry: &(String, Option<Instant>), now: Instant) -> bool {
    entry.1.is_none_or(|deadline| deadline > now)
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn set_ex_if_exists(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if live(entry, now) => {
                *entry = (value.to_string(), Some(now + Duration::from_secs(ttl_seconds)));
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if live(entry, now) => Ok(Some(entry.0.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let current = match entries.get(key) {
            Some(entry) if live(entry, now) => Some(entry.clone()),
            _ => None,
        };
        let (count, deadline) = match current {
            Some((value, deadline)) => {
                let count = value
                    .parse::<i64>()
                    .map_err(|_| AppError::Internal(format!("{key} is not a counter")))?;
                (count + 1, deadline)
            }
            None => (1, Some(now + Duration::from_secs(ttl_seconds))),
        };
        entries.insert(key.to_string(), (count.to_string(), deadline));
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| live(entry, now))
            .and_then(|entry| entry.1)
            .map(|deadline| deadline.saturating_duration_since(now).as_secs() as i64))
    }
}
