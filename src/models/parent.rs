use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// Length of a parent access code.
pub const ACCESS_CODE_LEN: usize = 8;
/// Characters an access code is drawn from. Leaves out 0/O and 1/I.
pub const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Represents a parent account.
#[derive(Debug, Clone)]
pub struct ParentAccount {
    /// The unique identifier for the parent.
    pub id: Uuid,
    /// The parent's email address.
    pub email: String,
    /// The Argon2 hash of the parent's password.
    pub password_hash: String,
    /// An optional display name.
    pub display_name: Option<String>,
    /// The shareable code that lists this parent's children for PIN login.
    pub access_code: String,
    /// The timestamp when the parent was created.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Row> for ParentAccount {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            display_name: row.try_get("display_name")?,
            access_code: row.try_get("access_code")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// The account view returned to the parent.
#[derive(Debug, Clone, Serialize)]
pub struct ParentProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub access_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ParentAccount> for ParentProfile {
    fn from(parent: &ParentAccount) -> Self {
        Self {
            id: parent.id,
            email: parent.email.clone(),
            display_name: parent.display_name.clone(),
            access_code: parent.access_code.clone(),
            created_at: parent.created_at,
        }
    }
}

/// Normalises user input into the stored access code form.
///
/// Returns `None` when the input can never match a code.
pub fn normalize_access_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    let valid = code.len() == ACCESS_CODE_LEN
        && code.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b));
    valid.then_some(code)
}
