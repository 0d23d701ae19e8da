use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The audit record of one PIN login attempt.
#[derive(Debug, Clone)]
pub struct PinAttempt {
    pub child_id: Uuid,
    pub ip_address: Option<String>,
    pub was_successful: bool,
    pub attempt_time: DateTime<Utc>,
}
