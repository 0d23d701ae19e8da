//! Daily usage arithmetic shared by every ledger backend.
//!
//! The Postgres backend expresses the same rules in a single `UPDATE`
//! statement; the in-memory backend calls these functions under its lock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The stored usage counters of one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    /// Minutes used today.
    pub used: i32,
    /// The daily limit in minutes.
    pub limit: i32,
    /// Whether the child is locked.
    pub locked: bool,
    /// The day `used` refers to.
    pub last_reset_date: Option<NaiveDate>,
}

impl UsageSnapshot {
    /// Applies the daily rollover: a snapshot from an earlier day starts today at zero.
    pub fn rolled_over(self, today: NaiveDate) -> Self {
        let stale = self.last_reset_date.is_none_or(|day| day < today);
        let used = if stale { 0 } else { self.used };
        Self {
            used,
            limit: self.limit,
            locked: is_locked(used, self.limit),
            last_reset_date: Some(if stale { today } else { self.last_reset_date.unwrap_or(today) }),
        }
    }

    /// Rolls over, then adds `minutes` and recomputes the lock.
    pub fn incremented(self, minutes: i32, today: NaiveDate) -> Self {
        let current = self.rolled_over(today);
        let used = current.used.saturating_add(minutes);
        Self {
            used,
            limit: current.limit,
            locked: is_locked(used, current.limit),
            last_reset_date: current.last_reset_date,
        }
    }

    pub fn remaining(&self) -> i32 {
        (self.limit - self.used).max(0)
    }

    pub fn report(&self) -> UsageReport {
        UsageReport {
            success: true,
            time_used_today: self.used,
            daily_limit: self.limit,
            remaining_minutes: self.remaining(),
            is_locked: self.locked,
        }
    }
}

/// The lock rule: a child is locked once usage reaches the limit.
pub fn is_locked(used: i32, limit: i32) -> bool {
    used >= limit
}

/// The ledger's answer to a usage read or increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub success: bool,
    pub time_used_today: i32,
    pub daily_limit: i32,
    pub remaining_minutes: i32,
    pub is_locked: bool,
}
