use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parent's cookie session, stored in the key-value store under `session:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentSession {
    /// The ID of the parent this session belongs to.
    pub parent_id: Uuid,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

/// An authenticated child play session.
///
/// Stored under `child_session:{sha256(token)}` with a TTL equal to the time
/// left until `expires_at`; the bearer token itself is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSession {
    /// The child this session authenticates.
    pub child_id: Uuid,
    /// The child's parent, denormalised for search and blocklist lookups.
    pub parent_id: Uuid,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
    /// The timestamp of the last request made with this session.
    pub last_activity: DateTime<Utc>,
}

impl ChildSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before expiry, at least one so a TTL can be set.
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }
}
