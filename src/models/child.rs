use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AppError, Result};
use crate::models::usage::UsageSnapshot;

/// Smallest daily limit a parent can configure, in minutes.
pub const MIN_DAILY_LIMIT_MINUTES: i32 = 15;
/// Largest daily limit a parent can configure, in minutes.
pub const MAX_DAILY_LIMIT_MINUTES: i32 = 180;
/// Maximum username length, in characters.
pub const MAX_USERNAME_CHARS: usize = 30;

/// A 4-digit child PIN. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Pin(String);

impl Pin {
    /// Parses a PIN, rejecting anything other than exactly 4 ASCII digits.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::Validation(
                "PIN must be exactly 4 digits".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// A daily time limit in minutes, bounded to what a parent may configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyLimit(i32);

impl DailyLimit {
    pub fn new(minutes: i32) -> Result<Self> {
        if !(MIN_DAILY_LIMIT_MINUTES..=MAX_DAILY_LIMIT_MINUTES).contains(&minutes) {
            return Err(AppError::Validation(format!(
                "Daily time limit must be between {} and {} minutes",
                MIN_DAILY_LIMIT_MINUTES, MAX_DAILY_LIMIT_MINUTES
            )));
        }
        Ok(Self(minutes))
    }

    pub fn minutes(self) -> i32 {
        self.0
    }
}

/// An avatar colour in `#RRGGBB` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarColor(String);

impl AvatarColor {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let valid = raw.len() == 7
            && raw.starts_with('#')
            && raw[1..].bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(AppError::Validation(
                "Avatar color must be a #RRGGBB hex value".to_string(),
            ));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A child's display name. Not unique across parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildName(String);

impl ChildName {
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Username cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_USERNAME_CHARS {
            return Err(AppError::Validation(format!(
                "Username must be at most {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Represents a child account owned by exactly one parent.
#[derive(Debug, Clone)]
pub struct ChildAccount {
    /// The unique identifier for the child.
    pub id: Uuid,
    /// The owning parent account.
    pub parent_id: Uuid,
    /// The display label shown on the login screen.
    pub username: String,
    /// The Argon2 hash of the child's PIN.
    pub pin_hash: String,
    /// The avatar colour.
    pub avatar_color: String,
    /// The daily limit in minutes.
    pub daily_time_limit_minutes: i32,
    /// Minutes used on `last_reset_date`.
    pub time_used_today: i32,
    /// Whether the account is locked for the rest of the day.
    pub is_locked: bool,
    /// The calendar day `time_used_today` refers to.
    pub last_reset_date: Option<NaiveDate>,
    /// The timestamp when the child was created.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Row> for ChildAccount {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            parent_id: row.try_get("parent_id")?,
            username: row.try_get("username")?,
            pin_hash: row.try_get("pin_hash")?,
            avatar_color: row.try_get("avatar_color")?,
            daily_time_limit_minutes: row.try_get("daily_time_limit_minutes")?,
            time_used_today: row.try_get("time_used_today")?,
            is_locked: row.try_get("is_locked")?,
            last_reset_date: row.try_get("last_reset_date")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl ChildAccount {
    /// The stored usage counters, as they are in the row.
    pub fn usage(&self) -> UsageSnapshot {
        UsageSnapshot {
            used: self.time_used_today,
            limit: self.daily_time_limit_minutes,
            locked: self.is_locked,
            last_reset_date: self.last_reset_date,
        }
    }

    pub fn apply_usage(&mut self, usage: UsageSnapshot) {
        self.time_used_today = usage.used;
        self.daily_time_limit_minutes = usage.limit;
        self.is_locked = usage.locked;
        self.last_reset_date = usage.last_reset_date;
    }
}

/// The validated input for a new child account.
#[derive(Debug)]
pub struct NewChild {
    pub parent_id: Uuid,
    pub username: ChildName,
    pub pin_hash: String,
    pub avatar_color: AvatarColor,
    pub daily_limit: DailyLimit,
}

/// A partial update of a child account. `None` fields are left unchanged.
#[derive(Debug, Default)]
pub struct ChildUpdate {
    pub username: Option<ChildName>,
    pub pin_hash: Option<String>,
    pub avatar_color: Option<AvatarColor>,
    pub daily_limit: Option<DailyLimit>,
}

/// The child entry shown on the login screen. Never carries the PIN.
#[derive(Debug, Clone, Serialize)]
pub struct ChildLoginEntry {
    pub id: Uuid,
    pub username: String,
    pub avatar_color: String,
    pub parent_id: Uuid,
}

impl From<&ChildAccount> for ChildLoginEntry {
    fn from(child: &ChildAccount) -> Self {
        Self {
            id: child.id,
            username: child.username.clone(),
            avatar_color: child.avatar_color.clone(),
            parent_id: child.parent_id,
        }
    }
}

/// The child view returned to the owning parent.
#[derive(Debug, Clone, Serialize)]
pub struct ChildSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar_color: String,
    pub daily_time_limit_minutes: i32,
    pub time_used_today: i32,
    pub remaining_minutes: i32,
    pub is_locked: bool,
    pub last_reset_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<&ChildAccount> for ChildSummary {
    fn from(child: &ChildAccount) -> Self {
        Self {
            id: child.id,
            username: child.username.clone(),
            avatar_color: child.avatar_color.clone(),
            daily_time_limit_minutes: child.daily_time_limit_minutes,
            time_used_today: child.time_used_today,
            remaining_minutes: (child.daily_time_limit_minutes - child.time_used_today).max(0),
            is_locked: child.is_locked,
            last_reset_date: child.last_reset_date,
            created_at: child.created_at,
        }
    }
}
